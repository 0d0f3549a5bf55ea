use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use datagen_events::NotificationHub;
use datagen_pipeline::{JobRegistry, SimulatedEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use datagen_api::config::ServerConfig;
use datagen_api::router::build_app_router;
use datagen_api::state::AppState;
use datagen_api::ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Notification hub ---
    let hub = Arc::new(NotificationHub::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&hub), config.heartbeat_interval());

    // --- Job registry ---
    let engine = Arc::new(SimulatedEngine::new(config.analysis_step_delay()));
    let registry = JobRegistry::new(Arc::clone(&hub), engine);
    tracing::info!(
        step_delay_ms = config.analysis_step_delay_ms,
        "Job registry started with simulated analysis engine",
    );

    // --- App state + router ---
    let state = AppState::new(config.clone(), Arc::clone(&registry));
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("Invalid HOST address '{}'", config.host))?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop analysis runs first; they may still publish final snapshots.
    registry.shutdown(config.shutdown_timeout()).await;

    let ws_count = hub.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    hub.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "datagen_api=debug,datagen_pipeline=debug,tower_http=debug".into()
    });
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

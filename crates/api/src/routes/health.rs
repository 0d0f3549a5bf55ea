use axum::extract::State;
use axum::{routing::get, Json, Router};
use datagen_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs currently held in memory.
    pub jobs: usize,
    /// Open subscriber channels across all jobs.
    pub subscribers: usize,
    /// When the longest-lived subscriber connected.
    pub oldest_subscriber_since: Option<Timestamp>,
}

/// GET /health -- returns service health and in-memory counters.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs: state.registry.job_count().await,
        subscribers: state.hub.connection_count().await,
        oldest_subscriber_since: state.hub.oldest_connection().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

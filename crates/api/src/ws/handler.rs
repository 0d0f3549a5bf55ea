use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use datagen_core::types::JobId;
use datagen_events::{Outbound, ServerEvent, HEARTBEAT_PONG};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::error::AppResult;
use crate::handlers::analysis::parse_job_id;
use crate::state::AppState;

/// GET /api/v1/analysis/{id}/ws
///
/// Upgrades the connection and subscribes it to updates for one job. The job
/// does not have to exist yet.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, job_id)))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers a bounded channel with the registry, which sends the
///      current snapshot first.
///   2. Spawns a sender task that frames channel messages onto the sink.
///   3. Spawns a receiver task that answers heartbeats.
///   4. Unsubscribes when either side finishes.
///
/// Only the hub holds a strong sender. When the hub drops the channel (slow
/// consumer, job deleted, shutdown) the sender task drains and ends.
async fn handle_socket(socket: WebSocket, state: AppState, job_id: JobId) {
    let (tx, mut rx) = mpsc::channel(state.config.subscriber_buffer);
    let reply_channel = tx.downgrade();
    let subscriber = state.registry.subscribe(job_id, tx).await;

    let span = tracing::info_span!("ws", job_id = %job_id, subscriber = %subscriber);
    tracing::info!(parent: &span, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: frame hub messages onto the WebSocket sink.
    let mut send_task = tokio::spawn(
        async move {
            while let Some(outbound) = rx.recv().await {
                let frame = match outbound {
                    Outbound::Snapshot(job) => match ServerEvent::JobUpdate(&*job).to_json() {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize job snapshot");
                            continue;
                        }
                    },
                    Outbound::Pong => Message::Text(Utf8Bytes::from_static(HEARTBEAT_PONG)),
                    Outbound::Ping => Message::Ping(Bytes::new()),
                    Outbound::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if sink.send(frame).await.is_err() {
                    tracing::debug!("WebSocket sink closed");
                    break;
                }
            }
        }
        .instrument(span.clone()),
    );

    // Receiver task: answer heartbeats, ignore everything else.
    let hub = std::sync::Arc::clone(&state.hub);
    let mut recv_task = tokio::spawn(
        async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(Message::Text(text)) => {
                        let Some(channel) = reply_channel.upgrade() else {
                            break;
                        };
                        if !hub.answer_heartbeat(&channel, text.as_str()) {
                            tracing::trace!("Ignoring client text frame");
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Pong(_)) => {
                        tracing::trace!("Pong received");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
        .instrument(span.clone()),
    );

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unsubscribe(job_id, subscriber).await;
    tracing::info!(parent: &span, "WebSocket disconnected");
}

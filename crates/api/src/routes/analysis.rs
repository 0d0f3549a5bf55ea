//! Route definitions for the `/analysis` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::analysis;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/analysis`.
///
/// ```text
/// GET    /                -> list_analyses
/// POST   /                -> submit_analysis (multipart)
/// GET    /{id}            -> get_analysis
/// PATCH  /{id}            -> update_analysis
/// DELETE /{id}            -> delete_analysis
/// GET    /{id}/status     -> get_status
/// POST   /{id}/cancel     -> cancel_analysis
/// POST   /{id}/restart    -> restart_analysis
/// GET    /{id}/ws         -> ws_handler
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(analysis::list_analyses).post(analysis::submit_analysis),
        )
        .route(
            "/{id}",
            get(analysis::get_analysis)
                .patch(analysis::update_analysis)
                .delete(analysis::delete_analysis),
        )
        .route("/{id}/status", get(analysis::get_status))
        .route("/{id}/cancel", post(analysis::cancel_analysis))
        .route("/{id}/restart", post(analysis::restart_analysis))
        .route("/{id}/ws", get(ws::ws_handler))
}

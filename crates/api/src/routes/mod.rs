pub mod analysis;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /analysis                          submit (POST), list (GET)
/// /analysis/{id}                     get, update (PATCH), delete
/// /analysis/{id}/status              status, progress and logs
/// /analysis/{id}/cancel              cancel (POST)
/// /analysis/{id}/restart             restart (POST)
/// /analysis/{id}/ws                  WebSocket subscription
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/analysis", analysis::router())
}

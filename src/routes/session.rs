//! Session resolution route.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;

use crate::state::AppState;

/// `GET /session` — the resolved ambient identity, or null. The embedding
/// frontend uses this to learn who the chat widget speaks for; an absent
/// identity is a normal response, not an error.
pub async fn current_session(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let identity = state.resolver.resolve(&headers).await;
    Json(serde_json::json!({ "identity": identity }))
}

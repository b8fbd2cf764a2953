//! Admin roster route.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};

use crate::routes::chat::chat_error_response;
use crate::services::chat;
use crate::state::AppState;

/// `GET /admin/chats` — one summary row per distinct owner, most active
/// first.
pub async fn list_chats(State(state): State<AppState>) -> Response {
    match chat::list_owner_summaries(&state.pool).await {
        Ok(users) => Json(serde_json::json!({ "users": users })).into_response(),
        Err(err) => chat_error_response(&err),
    }
}

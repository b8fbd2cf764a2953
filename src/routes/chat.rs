//! Chat message routes.
//!
//! The owner identity arrives under either of two field names (`user_id` or
//! the newer `user_auth_id`) on both the query string and the POST body; it
//! is normalized to one canonical id here, before anything touches the
//! store. `user_auth_id` wins when both are present.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::error;

use crate::services::chat::{self, ChatError, SenderRole};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub user_auth_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PostMessageBody {
    pub user_id: Option<String>,
    pub user_auth_id: Option<String>,
    pub sender_role: Option<String>,
    pub message: Option<String>,
}

fn canonical_owner(user_auth_id: Option<String>, user_id: Option<String>) -> Option<String> {
    user_auth_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| user_id.filter(|id| !id.trim().is_empty()))
}

pub(crate) fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub(crate) fn chat_error_response(err: &ChatError) -> Response {
    match err {
        ChatError::MissingOwner | ChatError::EmptyMessage => error_json(StatusCode::BAD_REQUEST, &err.to_string()),
        ChatError::Database(_) => {
            error!(error = %err, "chat store failure");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// `GET /chat?user_id=<id>` (alias `user_auth_id`) — all messages for one
/// owner, oldest first.
pub async fn list_messages(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let Some(owner_id) = canonical_owner(query.user_auth_id, query.user_id) else {
        return error_json(StatusCode::BAD_REQUEST, "User ID is required");
    };

    match chat::list_messages(&state.pool, &owner_id).await {
        Ok(messages) => Json(serde_json::json!({ "messages": messages })).into_response(),
        Err(err) => chat_error_response(&err),
    }
}

/// `POST /chat` — append a message for an owner.
pub async fn post_message(State(state): State<AppState>, Json(body): Json<PostMessageBody>) -> Response {
    let owner_id = canonical_owner(body.user_auth_id, body.user_id);
    let role = body.sender_role.as_deref().and_then(SenderRole::from_str);
    let text = body.message.unwrap_or_default();

    let (Some(owner_id), Some(role)) = (owner_id, role) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "user_id (or user_auth_id), sender_role, and message are required",
        );
    };
    if text.trim().is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "user_id (or user_auth_id), sender_role, and message are required",
        );
    }

    match chat::create_message(&state.pool, &owner_id, role, &text).await {
        Ok(message) => Json(serde_json::json!({ "message": message })).into_response(),
        Err(err) => chat_error_response(&err),
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

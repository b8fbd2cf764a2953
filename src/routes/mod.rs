//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Chat and admin endpoints live under a single Axum router alongside a
//! health check. The marketing site is served as static files via a
//! fallback `ServeDir`, so the binary hosts both surfaces.

pub mod admin;
pub mod chat;
pub mod session;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::env_parse;
use crate::state::AppState;

/// Resolve the path to the marketing website directory.
fn website_dir() -> PathBuf {
    env_parse("WEBSITE_DIR", PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("website"))
}

/// API routes + static marketing pages under one router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let website_service = ServeDir::new(website_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/chat", get(chat::list_messages).post(chat::post_message))
        .route("/admin/chats", get(admin::list_chats))
        .route("/session", get(session::current_session))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .fallback_service(website_service)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

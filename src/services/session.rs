//! Session resolution — ordered identity providers over ambient request state.
//!
//! ARCHITECTURE
//! ============
//! Identity is resolved from request headers by walking an ordered provider
//! chain: the external auth-service probe first, then the legacy `user`
//! cookie. A fixed test identity exists only behind `CHAT_TEST_IDENTITY`;
//! with the flag off, an unauthenticated request resolves to `None` and
//! nothing substitutes an identity silently.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::env_bool;

const USER_COOKIE_NAME: &str = "user";
const DEFAULT_AUTH_TOKEN_COOKIE: &str = "access_token";

/// Fixed identity served by the test provider. Matches the id the legacy
/// frontend fell back to, so seeded test data stays addressable.
pub const TEST_IDENTITY_ID: &str = "4453a704-5a44-4689-9240-dbe950ea6d24";

/// Resolved actor identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: String,
}

/// One source of ambient identity. Providers are consulted in order; the
/// first hit wins.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity>;
}

/// Ordered provider chain.
pub struct SessionResolver {
    providers: Vec<Arc<dyn IdentityProvider>>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self { providers }
    }

    /// Build the production chain from the environment: auth-service probe
    /// (when `AUTH_SESSION_URL` is set), the `user` cookie, and the
    /// env-gated test identity.
    #[must_use]
    pub fn from_env() -> Self {
        let mut providers: Vec<Arc<dyn IdentityProvider>> = Vec::new();
        if let Some(probe) = AuthServiceProvider::from_env() {
            providers.push(Arc::new(probe));
        }
        providers.push(Arc::new(UserCookieProvider));
        if env_bool("CHAT_TEST_IDENTITY").unwrap_or(false) {
            warn!("CHAT_TEST_IDENTITY enabled; unauthenticated requests resolve to the test identity");
            providers.push(Arc::new(TestIdentityProvider));
        }
        Self::new(providers)
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        for provider in &self.providers {
            if let Some(identity) = provider.resolve(headers).await {
                return Some(identity);
            }
        }
        None
    }
}

// =============================================================================
// AUTH SERVICE PROBE
// =============================================================================

/// Verifies an access-token cookie against the hosted auth service.
pub struct AuthServiceProvider {
    session_url: String,
    token_cookie: String,
}

impl AuthServiceProvider {
    /// Load from `AUTH_SESSION_URL` (+ optional `AUTH_TOKEN_COOKIE`).
    /// Returns `None` if the URL is missing (probe disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let session_url = std::env::var("AUTH_SESSION_URL").ok()?;
        let token_cookie =
            std::env::var("AUTH_TOKEN_COOKIE").unwrap_or_else(|_| DEFAULT_AUTH_TOKEN_COOKIE.to_owned());
        Some(Self { session_url, token_cookie })
    }
}

#[async_trait]
impl IdentityProvider for AuthServiceProvider {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let jar = CookieJar::from_headers(headers);
        let token = jar.get(&self.token_cookie).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return None;
        }

        let client = reqwest::Client::new();
        let resp = match client
            .get(&self.session_url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "auth session probe failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            return None;
        }

        match resp.json::<Identity>().await {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "auth session response decode failed");
                None
            }
        }
    }
}

// =============================================================================
// USER COOKIE
// =============================================================================

/// Legacy `user` cookie: URL-encoded JSON with `id`, `email`, `role`.
pub struct UserCookieProvider;

#[async_trait]
impl IdentityProvider for UserCookieProvider {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        let jar = CookieJar::from_headers(headers);
        let raw = jar.get(USER_COOKIE_NAME).map(Cookie::value)?;
        let decoded = percent_decode_str(raw).decode_utf8_lossy();

        match serde_json::from_str::<Identity>(&decoded) {
            Ok(identity) if !identity.id.is_empty() => Some(identity),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "user cookie parse failed");
                None
            }
        }
    }
}

// =============================================================================
// TEST IDENTITY
// =============================================================================

/// Env-gated fixed identity for exercising the chat store without real auth.
pub struct TestIdentityProvider;

#[async_trait]
impl IdentityProvider for TestIdentityProvider {
    async fn resolve(&self, _headers: &HeaderMap) -> Option<Identity> {
        Some(Identity {
            id: TEST_IDENTITY_ID.to_owned(),
            email: "user@example.com".to_owned(),
            role: "user".to_owned(),
        })
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

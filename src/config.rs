//! Typed environment-variable helpers shared across the crate.
//!
//! Configuration is plain env vars (loaded from `.env` at startup). Every
//! knob has a compiled-in default, so a missing or malformed value never
//! aborts startup; it falls back and the caller proceeds.

use std::str::FromStr;

/// Parse an env var into any `FromStr` type, falling back to `default` when
/// the var is unset or unparseable.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Tri-state boolean: `Some(true)`/`Some(false)` for recognized spellings,
/// `None` when unset or unrecognized so callers can pick their own default.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

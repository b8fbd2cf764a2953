//! skydesk — live support chat for the booking site.
//!
//! The server half owns the append-only chat store and its HTTP endpoints;
//! the client half (`widget`, `roster`) is the pure chat core an embedding
//! frontend drives against those endpoints.

pub mod config;
pub mod db;
pub mod roster;
pub mod routes;
pub mod services;
pub mod state;
pub mod widget;

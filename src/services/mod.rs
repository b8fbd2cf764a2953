//! Domain services used by the HTTP routes and the client-side chat core.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request translation and identity plumbing.

pub mod chat;
pub mod session;

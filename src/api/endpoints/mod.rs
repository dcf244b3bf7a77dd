//! HTTP endpoint handlers.
//!
//! Handlers validate input, then hand the blocking work (SQLite, provider
//! HTTP calls) to the blocking pool through `ApiContext::run_blocking`.

pub mod alerts;
pub mod analyze;
pub mod chat;
pub mod follow_up;
pub mod health;
pub mod index;
pub mod sessions;

//! HTTP surface of the visit triage service.
//!
//! JSON endpoints for indexing, chat, analysis, session storage, follow-up
//! and the alert dashboard. `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;

//! HTTP API.
//!
//! Exposes catalog maintenance, procedure records, lab quotes, patients
//! and reports as JSON endpoints under `/api/`. `api_router()` returns a
//! `Router` that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer};
pub use types::ApiContext;

//! HTTP API.
//!
//! Exposes the monitoring domain as JSON endpoints under `/api/`.
//! Protected routes run through Auth → Audit before the handler.
//!
//! The router is composable: `api_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;

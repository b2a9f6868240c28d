//! HTTP server module.
//!
//! This module provides the JSON API that accepts messages and hands
//! them to the provider router.

mod handlers;
mod server;
pub mod types;

pub use handlers::{LATENCY_MS_HEADER, PROVIDER_HEADER};
pub use server::{
    build_http_client, create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER,
};
pub use types::{HealthResponse, MessageRequest, ProvidersResponse};

//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use crate::providers::ProviderInfo;

/// Body of `POST /api/message`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "chat".to_string()
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub providers: Vec<String>,
    pub total_providers: usize,
}

/// Body of `GET /providers`.
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

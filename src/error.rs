//! Error types for promptrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for promptrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for promptrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// No provider has credentials; raised before any outbound call.
    #[error("No API providers configured. Set at least one provider API key.")]
    NoProvidersConfigured,

    /// Every configured provider failed; only the last failure is carried.
    #[error("All API providers failed. Last error: {last_error}")]
    AllProvidersFailed { last_error: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_)
            | Error::NoProvidersConfigured
            | Error::AllProvidersFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "detail": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

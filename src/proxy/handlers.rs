//! HTTP request handlers.

use axum::{
    extract::{Extension, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use super::server::{AppState, RequestId};
use super::types::{HealthResponse, MessageRequest, ProvidersResponse};

/// Response header: wall-clock latency in milliseconds (integer).
pub const LATENCY_MS_HEADER: &str = "x-relay-latency-ms";
/// Response header: provider name that produced the reply.
pub const PROVIDER_HEADER: &str = "x-relay-provider";

/// Attach relay metadata headers to a response.
///
/// Latency is always set; the provider header only when one produced the reply.
fn attach_relay_headers(response: &mut Response, latency_ms: u64, provider: Option<&str>) {
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static(LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms),
    );

    if let Some(provider_name) = provider {
        if let Ok(value) = HeaderValue::from_str(provider_name) {
            headers.insert(HeaderName::from_static(PROVIDER_HEADER), value);
        }
    }
}

/// Handle POST /api/message
pub async fn message(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<MessageRequest>,
) -> Response {
    let start = std::time::Instant::now();

    tracing::info!(
        request_id = %request_id.0,
        mode = %request.mode,
        message_chars = request.message.chars().count(),
        "Received message request"
    );

    let result = state.router.generate(&request.message, &request.mode).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(generation) => {
            tracing::info!(
                request_id = %request_id.0,
                provider = %generation.provider,
                latency_ms,
                "Message request completed"
            );
            let provider = generation.provider.clone();
            let mut response = Json(generation).into_response();
            attach_relay_headers(&mut response, latency_ms, Some(&provider));
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id.0,
                error = %e,
                latency_ms,
                "Message request failed"
            );
            let mut response = e.into_response();
            attach_relay_headers(&mut response, latency_ms, None);
            response
        }
    }
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.router.provider_names();
    Json(HealthResponse {
        status: "healthy",
        total_providers: providers.len(),
        providers,
    })
}

/// Handle GET /providers - registered providers in priority order
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(ProvidersResponse {
        providers: state.router.providers(),
    })
}

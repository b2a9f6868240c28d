//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use super::handlers;
use crate::config::{Config, HttpConfig};
use crate::router::ProviderRouter;

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-relay-request-id";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProviderRouter>,
}

/// Correlation ID assigned to every inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/message", post(handlers::message))
        .route("/health", get(handlers::health))
        .route("/providers", get(handlers::list_providers))
        .with_state(state)
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
}

async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(request_id);

    let span = tracing::info_span!("request", request_id = %request_id.0);
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.0.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

/// Build the outbound HTTP client shared by all providers.
pub fn build_http_client(config: &HttpConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let http_client = build_http_client(&config.http)?;
    let provider_router = ProviderRouter::from_config(&config, http_client);

    let state = AppState {
        router: Arc::new(provider_router),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting promptrelay server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

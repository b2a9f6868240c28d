//! LLM provider backends.
//!
//! Two seams live here:
//! - [`ModelClient`]: one wire call against one (key, model) pair
//! - [`Provider`]: what the router sees, `(prompt, system_instruction) -> text`
//!
//! [`ProviderEntry`] joins them: a configured provider that rotates its
//! client over every key and model via [`retry::rotate`].

mod gemini;
mod huggingface;
mod openai_compat;
pub mod retry;

pub use gemini::GeminiClient;
pub use huggingface::HuggingFaceClient;
pub use openai_compat::OpenAiCompatClient;
pub use retry::{is_rate_limited, RetryPolicy};

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ApiKey, ProviderConfig, ProviderKind};

/// Upper bound on how much of an upstream error body is kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Failure of a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to reach {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response from {provider}: {message}")]
    Decode { provider: String, message: String },

    #[error("{provider} returned an empty reply")]
    EmptyReply { provider: String },

    #[error("{0}")]
    Failed(String),
}

impl ProviderError {
    /// Error text without the provider name.
    pub fn detail(&self) -> String {
        match self {
            ProviderError::Status { status, body, .. } => format!("{}: {}", status, body),
            ProviderError::Transport { source, .. } => source.to_string(),
            ProviderError::Decode { message, .. } => message.clone(),
            ProviderError::EmptyReply { .. } => "empty reply".to_string(),
            ProviderError::Failed(message) => message.clone(),
        }
    }

    /// Whether the upstream answer marks a rate-limit or quota rejection.
    ///
    /// Only [`detail`](Self::detail) is matched, so a provider's own name
    /// never affects the outcome.
    pub fn is_rate_limited(&self) -> bool {
        is_rate_limited(&self.detail())
    }
}

/// One generation call against a single key and model.
///
/// Replies come back as the provider sent them; whitespace-only text is
/// [`ProviderError::EmptyReply`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        api_key: &ApiKey,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError>;
}

/// Public description of a registered provider. Never carries key material.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderInfo {
    pub name: String,
    pub kind: String,
    pub models: Vec<String>,
    pub keys: usize,
}

/// A named generation capability, as seen by the router.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, system_instruction: &str)
        -> Result<String, ProviderError>;

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            kind: "custom".to_string(),
            models: Vec::new(),
            keys: 0,
        }
    }
}

/// A configured provider: a model client plus its key and model lists.
pub struct ProviderEntry {
    name: String,
    kind: ProviderKind,
    models: Vec<String>,
    keys: Vec<ApiKey>,
    policy: RetryPolicy,
    client: Box<dyn ModelClient>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("models", &self.models)
            .field("keys", &self.keys.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProviderEntry {
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        models: Vec<String>,
        keys: Vec<ApiKey>,
        policy: RetryPolicy,
        client: Box<dyn ModelClient>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            models,
            keys,
            policy,
            client,
        }
    }

    /// Build the entry for a configured provider.
    ///
    /// Returns `None` when the provider has no keys, so it is never registered.
    pub fn from_config(
        config: &ProviderConfig,
        policy: RetryPolicy,
        http_client: reqwest::Client,
    ) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }

        let client: Box<dyn ModelClient> = match config.kind {
            ProviderKind::OpenaiCompatible => Box::new(OpenAiCompatClient::new(
                &config.display_name,
                &config.url,
                http_client,
            )),
            ProviderKind::Huggingface => Box::new(HuggingFaceClient::new(
                &config.display_name,
                &config.url,
                http_client,
            )),
            ProviderKind::Gemini => {
                Box::new(GeminiClient::new(
                &config.display_name,
                &config.url,
                http_client,
            ))
            }
        };

        Some(Self::new(
            config.display_name.clone(),
            config.kind,
            config.models.clone(),
            config.api_keys.clone(),
            policy,
            client,
        ))
    }
}

#[async_trait]
impl Provider for ProviderEntry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        retry::rotate(
            &self.name,
            &self.keys,
            &self.models,
            &self.policy,
            |key, model| async move {
                self.client
                    .complete(&key, &model, prompt, system_instruction)
                    .await
            },
        )
        .await
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            kind: self.kind.to_string(),
            models: self.models.clone(),
            keys: self.keys.len(),
        }
    }
}

/// Pass 2xx responses through; turn anything else into `ProviderError::Status`.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Status {
        provider: provider.to_string(),
        status,
        body: truncate(&body, MAX_ERROR_BODY_CHARS),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

//! Key and model rotation for a single provider.
//!
//! A provider is tried over its (key, model) matrix:
//! - Outer loop over keys, inner loop over models, both in configured order
//! - Each pair gets up to `max_attempts` attempts with a fixed `backoff` in between
//! - A rate-limit/quota failure abandons the pair at once, without waiting
//! - Exhausting the matrix returns the last error seen

use std::future::Future;
use std::time::Duration;

use super::ProviderError;
use crate::config::{ApiKey, RetryConfig};

/// Lowercased substrings that mark a rate-limit or quota failure.
pub const RATE_LIMIT_KEYWORDS: [&str; 4] = ["quota", "rate limit", "limit exceeded", "429"];

/// Whether an error message describes a rate-limit or quota rejection.
///
/// Matching is a case-insensitive substring test against [`RATE_LIMIT_KEYWORDS`].
pub fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Attempt budget for each (key, model) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per pair, including the first. Never below 1.
    pub max_attempts: u32,
    /// Pause before each repeat attempt on the same pair.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    /// One retry after a one second pause.
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }
}

/// Run `send` over every (key, model) pair until one succeeds.
///
/// `send` receives owned copies of the key and model so its future does not
/// borrow from the loop.
pub async fn rotate<T, F, Fut>(
    provider: &str,
    keys: &[ApiKey],
    models: &[String],
    policy: &RetryPolicy,
    send: F,
) -> Result<T, ProviderError>
where
    F: Fn(ApiKey, String) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_error: Option<ProviderError> = None;

    for (key_index, key) in keys.iter().enumerate() {
        for model in models {
            for attempt in 1..=policy.max_attempts {
                if attempt > 1 {
                    tokio::time::sleep(policy.backoff).await;
                }

                tracing::debug!(
                    provider = %provider,
                    model = %model,
                    key = %key.masked(),
                    key_index,
                    attempt,
                    "Attempting generation"
                );

                match send(key.clone(), model.clone()).await {
                    Ok(value) => {
                        tracing::info!(
                            provider = %provider,
                            model = %model,
                            key_index,
                            attempt,
                            "Generation succeeded"
                        );
                        return Ok(value);
                    }
                    Err(err) => {
                        let rate_limited = err.is_rate_limited();
                        if rate_limited {
                            tracing::warn!(
                                provider = %provider,
                                model = %model,
                                key = %key.masked(),
                                error = %err,
                                "Rate limit or quota hit, moving to next model"
                            );
                        } else {
                            tracing::warn!(
                                provider = %provider,
                                model = %model,
                                key = %key.masked(),
                                attempt,
                                max_attempts = policy.max_attempts,
                                error = %err,
                                "Generation attempt failed"
                            );
                        }

                        last_error = Some(err);

                        if rate_limited {
                            break;
                        }
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ProviderError::Failed(format!(
            "{} has no key/model combinations to try",
            provider
        ))
    }))
}

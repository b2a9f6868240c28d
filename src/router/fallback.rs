//! Ordered provider fallback.

use std::sync::Arc;

use serde::Serialize;

use super::mode::Mode;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::providers::{Provider, ProviderEntry, ProviderInfo, RetryPolicy};

/// Successful generation: the reply and the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub reply: String,
    pub provider: String,
}

/// Routes prompts across providers in priority order; first success wins.
#[derive(Clone)]
pub struct ProviderRouter {
    providers: Vec<Arc<dyn Provider>>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl ProviderRouter {
    /// Create a router over providers given in priority order.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Register every configured provider that has at least one key.
    pub fn from_config(config: &Config, http_client: reqwest::Client) -> Self {
        let policy = RetryPolicy::from(&config.retry);
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        for provider in &config.providers {
            match ProviderEntry::from_config(provider, policy, http_client.clone()) {
                Some(entry) => {
                    tracing::info!(
                        provider = %provider.name,
                        kind = %provider.kind,
                        models = ?provider.models,
                        keys = provider.api_keys.len(),
                        "Provider registered"
                    );
                    providers.push(Arc::new(entry));
                }
                None => {
                    tracing::info!(provider = %provider.name, "Provider not configured, skipping");
                }
            }
        }

        if providers.is_empty() {
            tracing::error!("No API providers configured! Add at least one provider API key");
        }

        Self::new(providers)
    }

    /// Generate a reply for `prompt` framed by `mode`'s system instruction.
    ///
    /// Providers are tried in order and the first success is returned.
    /// Fails with [`Error::NoProvidersConfigured`] before any call when the
    /// list is empty, and with [`Error::AllProvidersFailed`] carrying the
    /// last provider's error when every provider failed.
    pub async fn generate(&self, prompt: &str, mode: &str) -> Result<GenerationResult> {
        let mode = Mode::parse(mode);
        let system_instruction = mode.system_instruction();

        if self.providers.is_empty() {
            return Err(Error::NoProvidersConfigured);
        }

        let mut last_error = None;

        for provider in &self.providers {
            tracing::info!(provider = %provider.name(), mode = %mode, "Attempting provider");

            match provider.generate(prompt, system_instruction).await {
                Ok(reply) => {
                    tracing::info!(provider = %provider.name(), "Provider succeeded");
                    return Ok(GenerationResult {
                        reply,
                        provider: provider.name().to_string(),
                    });
                }
                Err(err) => {
                    if err.is_rate_limited() {
                        tracing::warn!(
                            provider = %provider.name(),
                            "Provider quota exceeded, trying next provider"
                        );
                    } else {
                        tracing::warn!(
                            provider = %provider.name(),
                            error = %err,
                            "Provider failed, trying next provider"
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(Error::AllProvidersFailed {
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Names of registered providers, in priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Descriptions of registered providers, in priority order.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(|p| p.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Provider that always returns the same outcome and counts calls.
    struct FixedProvider {
        name: &'static str,
        outcome: std::result::Result<&'static str, &'static str>,
        calls: AtomicU32,
        last_instruction: Mutex<Option<String>>,
    }

    impl FixedProvider {
        fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome: Ok(reply),
                calls: AtomicU32::new(0),
                last_instruction: Mutex::new(None),
            })
        }

        fn failing(name: &'static str, error: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome: Err(error),
                calls: AtomicU32::new(0),
                last_instruction: Mutex::new(None),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(
            &self,
            _prompt: &str,
            system_instruction: &str,
        ) -> std::result::Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            *self.last_instruction.lock().unwrap() = Some(system_instruction.to_string());
            self.outcome
                .map(str::to_string)
                .map_err(|e| ProviderError::Failed(e.to_string()))
        }
    }

    fn router(providers: &[Arc<FixedProvider>]) -> ProviderRouter {
        ProviderRouter::new(
            providers
                .iter()
                .map(|p| p.clone() as Arc<dyn Provider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_empty_router_is_configuration_error() {
        let result = ProviderRouter::new(vec![]).generate("hello", "chat").await;
        assert!(matches!(result, Err(Error::NoProvidersConfigured)));
    }

    #[tokio::test]
    async fn test_first_success_wins_and_later_providers_untouched() {
        let a = FixedProvider::failing("A", "connection reset");
        let b = FixedProvider::ok("B", "from B");
        let c = FixedProvider::ok("C", "from C");
        let router = router(&[a.clone(), b.clone(), c.clone()]);

        let result = router.generate("hello", "chat").await.unwrap();
        assert_eq!(
            result,
            GenerationResult {
                reply: "from B".to_string(),
                provider: "B".to_string(),
            }
        );
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_provider_still_falls_through() {
        let a = FixedProvider::failing("A", "You exceeded your current quota");
        let b = FixedProvider::ok("B", "ok");
        let router = router(&[a.clone(), b.clone()]);

        let result = router.generate("hello", "chat").await.unwrap();
        assert_eq!(result.provider, "B");
    }

    #[tokio::test]
    async fn test_all_failed_carries_last_error() {
        let a = FixedProvider::failing("A", "first failure");
        let b = FixedProvider::failing("B", "second failure");
        let router = router(&[a.clone(), b.clone()]);

        let err = router.generate("hello", "chat").await.unwrap_err();
        match &err {
            Error::AllProvidersFailed { last_error } => assert_eq!(last_error, "second failure"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("second failure"));
        assert!(!err.to_string().contains("first failure"));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_mode_selects_instruction() {
        let a = FixedProvider::ok("A", "ok");
        let router = router(&[a.clone()]);

        router.generate("text", "summarize").await.unwrap();
        assert_eq!(
            a.last_instruction.lock().unwrap().as_deref(),
            Some(Mode::Summarize.system_instruction())
        );

        router.generate("text", "no-such-mode").await.unwrap();
        assert_eq!(
            a.last_instruction.lock().unwrap().as_deref(),
            Some(Mode::Chat.system_instruction())
        );
    }

    #[test]
    fn test_from_config_registers_only_keyed_providers() {
        let lookup = |name: &str| match name {
            "GEMINI_API_KEY" => Some("AIzaSyExampleKey".to_string()),
            _ => None,
        };
        let (config, _) = Config::from_raw_with(Default::default(), lookup).unwrap();
        let router = ProviderRouter::from_config(&config, reqwest::Client::new());

        assert_eq!(router.provider_names(), vec!["Gemini"]);
        assert_eq!(router.len(), 1);
        let info = &router.providers()[0];
        assert_eq!(info.kind, "gemini");
        assert_eq!(info.keys, 1);
    }
}

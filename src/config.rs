//! Configuration parsing, credential resolution, and validation.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    /// Providers in priority order, including ones with no credentials.
    pub providers: Vec<ProviderConfig>,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Outbound HTTP client settings shared by every provider.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Retry policy applied to each (key, model) pair of a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per pair, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between attempts on the same pair.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display and zeroizes on drop.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Loggable form of the key, see [`mask_key`].
    pub fn masked(&self) -> String {
        mask_key(self.expose_secret())
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// Shorten a key to `first8...last4`, or `***` when it is 12 characters or fewer.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Whether a value is an unfilled template such as `your_groq_api_key_here`.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.starts_with("your_") && v.ends_with("_here")
}

/// Split a comma-separated credential value into keys.
///
/// Items are trimmed; empty items and placeholders are dropped. Order is kept.
pub fn parse_key_list(value: &str) -> Vec<ApiKey> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty() && !is_placeholder(k))
        .map(ApiKey::from)
        .collect()
}

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `POST {url}/chat/completions` (Groq, Together, OpenRouter, ...)
    OpenaiCompatible,
    /// Hugging Face Inference text generation
    Huggingface,
    /// Google Gemini `generateContent`
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenaiCompatible => "openai_compatible",
            ProviderKind::Huggingface => "huggingface",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Endpoint root used when a provider entry leaves `url` unset.
    pub fn default_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenaiCompatible => "https://api.groq.com/openai/v1",
            ProviderKind::Huggingface => "https://api-inference.huggingface.co/models",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Models used when a provider entry leaves `models` empty, most capable first.
    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenaiCompatible => &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
            ProviderKind::Huggingface => &["meta-llama/Meta-Llama-3-70B-Instruct"],
            ProviderKind::Gemini => &["gemini-flash-latest"],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider's API keys were resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from convention env var (holds var name)
    Convention(String),
    /// No usable key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Unique name, used for the convention key variable and in logs
    pub name: String,
    /// Name reported back to callers as `provider`; defaults to `name`
    pub display_name: String,
    pub kind: ProviderKind,
    /// Endpoint root for the provider's API
    pub url: String,
    /// Models to rotate through, most capable first
    pub models: Vec<String>,
    /// Keys to rotate through, in supplied order. Empty means not configured.
    pub api_keys: Vec<ApiKey>,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

impl Config {
    /// Built-in catalog with credentials read from the process environment.
    pub fn from_env() -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        Self::from_raw(RawConfig::default())
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// This is the env-var-aware entry point. It:
    /// 1. Reads the file
    /// 2. Parses as `RawConfig` (api_key as plain String)
    /// 3. Expands `${VAR}` references and applies convention lookup
    /// 4. Validates the resulting config
    ///
    /// Returns the config and per-provider key source information.
    pub fn from_file_with_env(
        path: impl AsRef<Path>,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str_with(&content, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a TOML string, resolving variables through `lookup`.
    pub fn parse_str_with<F>(
        content: &str,
        lookup: F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Self::from_raw_with(raw, lookup)
    }

    /// Convert raw config to final config using real environment variables.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        Self::from_raw_with(raw, |name| std::env::var(name).ok())
    }

    /// Convert raw (deserialized) config to final config.
    ///
    /// For each provider:
    /// - If `api_key` contains `${VAR}`: expand through `lookup`, source = `EnvExpanded`;
    ///   an unset variable leaves the provider without keys
    /// - If `api_key` is a literal string: use directly, source = `Literal`
    /// - If `api_key` is absent: try `<UPPER_SNAKE_NAME>_API_KEY`,
    ///   source = `Convention(var_name)` or `KeySource::None`
    ///
    /// In every case the value is split as a comma-separated key list.
    /// Placeholders resolve to no keys and report `KeySource::None`.
    pub fn from_raw_with<F>(
        raw: RawConfig,
        lookup: F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_providers = raw.providers.unwrap_or_else(builtin_providers);
        let mut providers = Vec::with_capacity(raw_providers.len());
        let mut key_sources = Vec::with_capacity(raw_providers.len());

        for rp in raw_providers {
            let (api_keys, source) = match rp.api_key {
                Some(ref raw_key) if raw_key.contains("${") => {
                    match expand_env_vars_with(raw_key, &rp.name, &lookup) {
                        Ok(expanded) => (parse_key_list(&expanded), KeySource::EnvExpanded),
                        Err(ConfigError::UnsetVar { var, .. }) => {
                            tracing::warn!(
                                provider = %rp.name,
                                var = %var,
                                "api_key references an unset variable, provider has no keys"
                            );
                            (Vec::new(), KeySource::None)
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(ref raw_key) => (parse_key_list(raw_key), KeySource::Literal),
                None => {
                    let var_name = convention_env_var_name(&rp.name);
                    match lookup(&var_name) {
                        Some(value) => (parse_key_list(&value), KeySource::Convention(var_name)),
                        None => (Vec::new(), KeySource::None),
                    }
                }
            };
            let source = if api_keys.is_empty() {
                KeySource::None
            } else {
                source
            };

            key_sources.push((rp.name.clone(), source));

            let models = if rp.models.is_empty() {
                rp.kind
                    .default_models()
                    .iter()
                    .map(|m| m.to_string())
                    .collect()
            } else {
                rp.models
            };

            providers.push(ProviderConfig {
                url: rp.url.unwrap_or_else(|| rp.kind.default_url().to_string()),
                display_name: rp.display_name.unwrap_or_else(|| rp.name.clone()),
                name: rp.name,
                kind: rp.kind,
                models,
                api_keys,
            });
        }

        let config = Config {
            server: raw.server,
            http: raw.http,
            retry: raw.retry,
            providers,
            logging: raw.logging,
        };
        config.validate()?;

        Ok((config, key_sources))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider #{} has empty name",
                    i + 1
                )));
            }
            if provider.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider.name
                )));
            }
            if provider.models.iter().any(|m| m.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' lists an empty model name",
                    provider.name
                )));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' is defined more than once",
                    provider.name
                )));
            }
        }

        if !self.providers.iter().any(ProviderConfig::is_configured) {
            tracing::warn!("No provider has an API key - relay will reject all requests");
        }

        Ok(())
    }

    /// Providers that have at least one key, in priority order.
    pub fn configured_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.is_configured())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Invalid api_key for provider '{provider}': {message}")]
    EnvVar { provider: String, message: String },

    #[error("Environment variable '{var}' is not set (referenced in provider '{provider}')")]
    UnsetVar { var: String, provider: String },
}

/// Raw provider config deserialized directly from TOML.
/// api_key is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawProviderConfig {
    name: String,
    display_name: Option<String>,
    kind: ProviderKind,
    url: Option<String>,
    #[serde(default)]
    models: Vec<String>,
    api_key: Option<String>,
}

/// Raw configuration deserialized directly from TOML.
///
/// A missing `providers` table selects the built-in catalog; an explicit
/// empty list means no providers at all.
#[derive(Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    retry: RetryConfig,
    providers: Option<Vec<RawProviderConfig>>,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Built-in provider catalog: fastest first, broadest fallback last.
fn builtin_providers() -> Vec<RawProviderConfig> {
    [
        ("groq", "Groq", ProviderKind::OpenaiCompatible),
        ("huggingface", "Hugging Face", ProviderKind::Huggingface),
        ("gemini", "Gemini", ProviderKind::Gemini),
    ]
    .into_iter()
    .map(|(name, display_name, kind)| RawProviderConfig {
        name: name.to_string(),
        display_name: Some(display_name.to_string()),
        kind,
        url: None,
        models: Vec::new(),
        api_key: None,
    })
    .collect()
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${KEY_A},${KEY_B}`).
/// Fails on the first unset variable (`UnsetVar`); an unclosed `${` or an
/// empty variable name is an `EnvVar` error.
fn expand_env_vars_with<F>(
    input: &str,
    provider_name: &str,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            provider: provider_name.to_string(),
            message: "Unclosed '${' in api_key value".to_string(),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                provider: provider_name.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::UnsetVar {
            var: var_name.to_string(),
            provider: provider_name.to_string(),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Derive the convention-based env var name for a provider.
///
/// Transforms provider name to `<UPPER_SNAKE_NAME>_API_KEY`:
/// - "groq" -> "GROQ_API_KEY"
/// - "hugging-face" -> "HUGGING_FACE_API_KEY"
/// - "my service" -> "MY_SERVICE_API_KEY"
pub fn convention_env_var_name(provider_name: &str) -> String {
    let upper_snake = provider_name.to_uppercase().replace(['-', ' '], "_");
    format!("{}_API_KEY", upper_snake)
}

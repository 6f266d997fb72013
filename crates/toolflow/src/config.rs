//! Client configuration with Groq defaults.
//!
//! [`ClientConfig`] holds everything the [`ChatClient`](crate::ChatClient)
//! needs. Build it explicitly, or load it with [`ClientConfig::from_env`],
//! which fails fast when the credential is missing.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";
/// Optional override for the API base URL.
pub const BASE_URL_ENV: &str = "GROQ_BASE_URL";
/// Optional override for the default model.
pub const MODEL_ENV: &str = "GROQ_MODEL";

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct ClientConfig {
    /// Bearer token sent with every request.
    pub api_key: String,
    /// API root, without the `/chat/completions` suffix.
    /// Default: `"https://api.groq.com/openai/v1"`.
    pub base_url: String,
    /// Model used when a request does not name one.
    /// Default: `"llama-3.3-70b-versatile"`.
    pub model: String,
    /// Per-request timeout. Default: 120 seconds.
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a config with the given API key and Groq defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// `GROQ_API_KEY` is required; `GROQ_BASE_URL` and `GROQ_MODEL` are
    /// optional overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!("{API_KEY_ENV} environment variable is not set"))
            })?;

        let mut config = Self::new(api_key);
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config = config.with_base_url(url);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            config = config.with_model(model);
        }
        Ok(config)
    }

    /// Set the API root. A trailing `/` is dropped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn blank_key_is_configuration_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn defaults_point_at_groq() {
        let config = ClientConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "gsk-test")])).unwrap();
        assert_eq!(config.api_key, "gsk-test");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(
            config.completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (API_KEY_ENV, "k"),
            (BASE_URL_ENV, "http://localhost:8080/v1/"),
            (MODEL_ENV, "llama-3.1-8b-instant"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ClientConfig::new("super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

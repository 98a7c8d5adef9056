use std::env;
use std::fmt;

use crate::errors::{ModelError, ModelResult};

pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

pub trait ProviderConfig {
    /// Load configuration from environment variables
    fn from_env() -> ModelResult<Self>
    where
        Self: Sized;

    /// Read an environment variable, failing only when it is required and unset
    fn get_env(key: &str, required: bool, default: Option<String>) -> ModelResult<Option<String>> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) if !required => Ok(default),
            Err(env::VarError::NotPresent) => Err(ModelError::Configuration(format!(
                "Environment variable '{}' is required but not set.",
                key
            ))),
            Err(e) => Err(ModelError::Configuration(format!("{}: {}", key, e))),
        }
    }
}

/// What to do with the recorded token counts when a response carries no usage metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsageAccounting {
    /// Leave the counts of the previous call in place
    #[default]
    KeepPrevious,
    /// Clear the counts to unknown
    Reset,
}

#[derive(Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub usage_accounting: UsageAccounting,
}

impl GeminiProviderConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: GEMINI_HOST.to_string(),
            api_key: api_key.into(),
            model: GEMINI_DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
            usage_accounting: UsageAccounting::default(),
        }
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_usage_accounting(mut self, usage_accounting: UsageAccounting) -> Self {
        self.usage_accounting = usage_accounting;
        self
    }
}

// Keeps the key out of logs
impl fmt::Debug for GeminiProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProviderConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("max_tokens", &self.max_tokens)
            .field("usage_accounting", &self.usage_accounting)
            .finish()
    }
}

impl ProviderConfig for GeminiProviderConfig {
    fn from_env() -> ModelResult<Self> {
        let api_key = Self::get_env("GOOGLE_API_KEY", true, None)?.ok_or_else(|| {
            ModelError::Configuration("Google API key should be present".to_string())
        })?;

        let host = Self::get_env("GEMINI_HOST", false, Some(GEMINI_HOST.to_string()))?
            .unwrap_or_else(|| GEMINI_HOST.to_string());

        let model = Self::get_env(
            "GEMINI_MODEL",
            false,
            Some(GEMINI_DEFAULT_MODEL.to_string()),
        )?
        .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string());

        Ok(Self::new(api_key).with_host(host).with_model(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_requires_api_key() {
        env::remove_var("GOOGLE_API_KEY");
        let result = GeminiProviderConfig::from_env();
        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::set_var("GOOGLE_API_KEY", "test_key");
        env::remove_var("GEMINI_HOST");
        env::set_var("GEMINI_MODEL", "gemini-1.5-pro");

        let config = GeminiProviderConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test_key");
        assert_eq!(config.host, GEMINI_HOST);
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.usage_accounting, UsageAccounting::KeepPrevious);

        env::remove_var("GOOGLE_API_KEY");
        env::remove_var("GEMINI_MODEL");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = GeminiProviderConfig::new("very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

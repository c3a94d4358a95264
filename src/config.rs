//! Process configuration for the completion provider.

use std::time::Duration;

use thiserror::Error;

use crate::constants;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; export it or add it to a .env file before starting SYNC")]
    MissingCredential(&'static str),
}

/// Everything the HTTP gateway needs to reach the provider.
#[derive(Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub timeout: Duration,
}

// Keeps the key out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_completion_tokens", &self.max_completion_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GatewayConfig {
    /// Builds the config from a credential (usually from `GROQ_API_KEY`) and
    /// the environment-derived defaults. A missing or blank key is fatal.
    pub fn resolve(api_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential(constants::API_KEY_ENV))?;

        Ok(Self {
            api_key,
            api_url: constants::GROQ_API_URL.clone(),
            model: constants::SYNC_CHAT_MODEL.clone(),
            temperature: constants::TEMPERATURE,
            max_completion_tokens: constants::MAX_COMPLETION_TOKENS,
            timeout: Duration::from_secs(*constants::REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

//! Provider connection settings

use serde::{Deserialize, Serialize};
use supportbot_core::{AppConfig, Error, ProviderKind, Result};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Everything needed to talk to one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl ProviderConfig {
    /// Create configuration with explicit values and the provider's public endpoint
    pub fn new(kind: ProviderKind, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: model.into(),
            base_url: Self::default_base_url(kind).to_string(),
        }
    }

    /// Build the configuration for `kind` from the application settings
    pub fn from_app_config(kind: ProviderKind, config: &AppConfig) -> Result<Self> {
        let api_key = config
            .api_key(kind)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "API key for {} not configured. Please set {} in your .env file.",
                    kind,
                    kind.api_key_var()
                ))
            })?;

        Ok(Self::new(kind, api_key, config.model_name(kind)))
    }

    /// Point the client at a different endpoint, e.g. a proxy
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn default_base_url(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::OpenAi => OPENAI_CHAT_URL,
            ProviderKind::Groq => GROQ_CHAT_URL,
            ProviderKind::Gemini => GEMINI_API_BASE,
        }
    }
}

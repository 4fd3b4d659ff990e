//! Application configuration
//!
//! All API keys come from the environment (or a `.env` file loaded through
//! `dotenvy`). Every tunable has a default matching the shipped behaviour and
//! can be overridden by a `SUPPORTBOT_*` variable.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, ProviderKind, ResponseMode, Result};

pub const CONCISE_SYSTEM_PROMPT: &str = "You are a helpful e-commerce customer support assistant.
Provide SHORT, CONCISE, and ACCURATE answers. Keep responses under 2-3 sentences.
Answer naturally as if the information is your own knowledge.
Do NOT say \"according to the knowledge base\" or \"based on the provided context\".
Base your answers STRICTLY on the provided context but do not explicitly mention it.
Be clear, direct, and professional.";

pub const DETAILED_SYSTEM_PROMPT: &str = "You are a knowledgeable e-commerce customer support assistant.
Provide DETAILED, ACCURATE, and CLEAR answers.
Answer naturally as if the information is your own knowledge.
Do NOT say \"according to the knowledge base\" or \"based on the provided context\".
Base your answers STRICTLY on the provided context but do not explicitly mention it.
Include relevant details and step-by-step instructions where applicable.
Be professional, friendly, and ensure the customer understands the information clearly.";

/// Which embedder backs the knowledge base index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Offline feature hashing, no network access required
    Hashing,
    /// OpenAI `/v1/embeddings`, requires `OPENAI_API_KEY`
    OpenAi,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(EmbeddingBackend::Hashing),
            "openai" => Ok(EmbeddingBackend::OpenAi),
            other => Err(Error::Configuration(format!(
                "unknown embedding backend '{}', expected 'hashing' or 'openai'",
                other
            ))),
        }
    }
}

/// Centralized configuration for the chatbot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub groq_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,

    pub default_provider: ProviderKind,
    pub openai_model: String,
    pub groq_model: String,
    pub gemini_model: String,

    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub concise_max_tokens: u32,
    pub detailed_max_tokens: u32,
    pub request_timeout: Duration,

    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k_retrieval: usize,

    pub data_dir: PathBuf,
    pub vector_store_path: PathBuf,
    pub chat_storage_dir: PathBuf,
    pub product_catalog_path: PathBuf,

    pub max_search_results: usize,
    pub search_timeout: Duration,

    pub log_level: String,
    pub log_file: Option<PathBuf>,

    pub app_title: String,
    pub app_description: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            groq_api_key: None,
            gemini_api_key: None,
            default_provider: ProviderKind::Groq,
            openai_model: "gpt-3.5-turbo".to_string(),
            groq_model: "llama-3.1-8b-instant".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 0.9,
            concise_max_tokens: 150,
            detailed_max_tokens: 1000,
            request_timeout: Duration::from_secs(60),
            embedding_backend: EmbeddingBackend::Hashing,
            embedding_model: "text-embedding-3-small".to_string(),
            chunk_size: 500,
            chunk_overlap: 50,
            top_k_retrieval: 3,
            data_dir: PathBuf::from("data"),
            vector_store_path: PathBuf::from("data/vector_store"),
            chat_storage_dir: PathBuf::from("data/chats"),
            product_catalog_path: PathBuf::from("data/products.json"),
            max_search_results: 5,
            search_timeout: Duration::from_secs(10),
            log_level: "info".to_string(),
            log_file: None,
            app_title: "🛍️ E-commerce Customer Support Chatbot".to_string(),
            app_description:
                "Intelligent assistant for product inquiries, order status, returns, and promotions"
                    .to_string(),
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.openai_api_key = get("OPENAI_API_KEY");
        config.groq_api_key = get("GROQ_API_KEY");
        config.gemini_api_key = get("GEMINI_API_KEY");

        if let Some(provider) = get("SUPPORTBOT_PROVIDER") {
            config.default_provider = provider
                .parse()
                .map_err(|e: Error| Error::Configuration(format!("SUPPORTBOT_PROVIDER: {}", e)))?;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.openai_model = model;
        }
        if let Some(model) = get("GROQ_MODEL") {
            config.groq_model = model;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            config.gemini_model = model;
        }

        if let Some(v) = get("SUPPORTBOT_TEMPERATURE") {
            config.temperature = parse_var("SUPPORTBOT_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_MAX_TOKENS") {
            config.max_tokens = parse_var("SUPPORTBOT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_TOP_P") {
            config.top_p = parse_var("SUPPORTBOT_TOP_P", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_var("SUPPORTBOT_REQUEST_TIMEOUT_SECS", &v)?);
        }

        if let Some(v) = get("SUPPORTBOT_EMBEDDING_BACKEND") {
            config.embedding_backend = v.parse()?;
        }
        if let Some(v) = get("SUPPORTBOT_EMBEDDING_MODEL") {
            config.embedding_model = v;
        }
        if let Some(v) = get("SUPPORTBOT_CHUNK_SIZE") {
            config.chunk_size = parse_var("SUPPORTBOT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_CHUNK_OVERLAP") {
            config.chunk_overlap = parse_var("SUPPORTBOT_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_TOP_K") {
            config.top_k_retrieval = parse_var("SUPPORTBOT_TOP_K", &v)?;
        }

        if let Some(v) = get("SUPPORTBOT_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SUPPORTBOT_VECTOR_STORE") {
            config.vector_store_path = PathBuf::from(v);
        }
        if let Some(v) = get("SUPPORTBOT_CHAT_DIR") {
            config.chat_storage_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SUPPORTBOT_CATALOG") {
            config.product_catalog_path = PathBuf::from(v);
        }

        if let Some(v) = get("SUPPORTBOT_MAX_SEARCH_RESULTS") {
            config.max_search_results = parse_var("SUPPORTBOT_MAX_SEARCH_RESULTS", &v)?;
        }
        if let Some(v) = get("SUPPORTBOT_SEARCH_TIMEOUT_SECS") {
            config.search_timeout =
                Duration::from_secs(parse_var("SUPPORTBOT_SEARCH_TIMEOUT_SECS", &v)?);
        }

        if let Some(v) = get("SUPPORTBOT_LOG").or_else(|| get("RUST_LOG")) {
            config.log_level = v;
        }
        config.log_file = get("SUPPORTBOT_LOG_FILE").map(PathBuf::from);

        Ok(config)
    }

    /// Validate that an API key exists for the specified provider
    pub fn validate_api_key(&self, provider: ProviderKind) -> bool {
        self.api_key(provider)
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Get the API key for the specified provider
    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Groq => self.groq_api_key.as_deref(),
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
        }
    }

    /// Get the model name for the specified provider
    pub fn model_name(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::OpenAi => &self.openai_model,
            ProviderKind::Groq => &self.groq_model,
            ProviderKind::Gemini => &self.gemini_model,
        }
    }

    /// System prompt for a response mode
    pub fn system_prompt(&self, mode: ResponseMode) -> &'static str {
        match mode {
            ResponseMode::Concise => CONCISE_SYSTEM_PROMPT,
            ResponseMode::Detailed => DETAILED_SYSTEM_PROMPT,
        }
    }

    /// Maximum answer tokens for a response mode
    pub fn max_tokens_for(&self, mode: ResponseMode) -> u32 {
        match mode {
            ResponseMode::Concise => self.concise_max_tokens,
            ResponseMode::Detailed => self.detailed_max_tokens,
        }
    }

    /// Providers that have an API key configured
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|p| self.validate_api_key(*p))
            .collect()
    }

    /// Check that at least one LLM provider is usable
    ///
    /// Returns a summary of the configured providers, or a `Configuration`
    /// error carrying setup instructions.
    pub fn validate_configuration(&self) -> Result<String> {
        let available = self.available_providers();
        if available.is_empty() {
            return Err(Error::Configuration(
                "No API keys configured!\n\n\
                 Please configure at least one LLM provider API key in your .env file:\n\n\
                 1. Copy .env.example to .env\n\
                 2. Add your API key(s):\n   \
                    - GROQ_API_KEY=your_key_here (free tier available)\n   \
                    - GEMINI_API_KEY=your_key_here (free tier available)\n   \
                    - OPENAI_API_KEY=your_key_here (paid service)\n\
                 3. Restart the application\n\n\
                 Get API keys at:\n\
                 - Groq: https://console.groq.com/keys\n\
                 - Gemini: https://ai.google.dev\n\
                 - OpenAI: https://platform.openai.com/api-keys"
                    .to_string(),
            ));
        }

        let names: Vec<&str> = available.iter().map(|p| p.as_str()).collect();
        Ok(format!("Configured providers: {}", names.join(", ")))
    }

    /// Pick the provider to use: the requested one, else the default, else the first available
    pub fn resolve_provider(&self, requested: Option<ProviderKind>) -> Result<ProviderKind> {
        if let Some(provider) = requested {
            if self.validate_api_key(provider) {
                return Ok(provider);
            }
            return Err(Error::Configuration(format!(
                "API key for {} not configured. Please set {} in your .env file.",
                provider,
                provider.api_key_var()
            )));
        }

        if self.validate_api_key(self.default_provider) {
            return Ok(self.default_provider);
        }

        self.available_providers()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Configuration("no LLM provider API key configured".to_string()))
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::Configuration(format!("{} has an invalid value: '{}'", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_shipped_settings() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.default_provider, ProviderKind::Groq);
        assert_eq!(config.groq_model, "llama-3.1-8b-instant");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k_retrieval, 3);
        assert_eq!(config.max_tokens_for(ResponseMode::Concise), 150);
        assert_eq!(config.max_tokens_for(ResponseMode::Detailed), 1000);
        assert!(config.available_providers().is_empty());
    }

    #[test]
    fn blank_keys_are_not_configured() {
        let config = config_from(&[("GROQ_API_KEY", "   "), ("GEMINI_API_KEY", "g-key")]).unwrap();
        assert!(!config.validate_api_key(ProviderKind::Groq));
        assert!(config.validate_api_key(ProviderKind::Gemini));
        assert_eq!(config.available_providers(), vec![ProviderKind::Gemini]);
    }

    #[test]
    fn available_providers_keep_menu_order() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "g"),
            ("OPENAI_API_KEY", "o"),
            ("GROQ_API_KEY", "q"),
        ])
        .unwrap();
        assert_eq!(
            config.available_providers(),
            vec![ProviderKind::OpenAi, ProviderKind::Groq, ProviderKind::Gemini]
        );
        assert_eq!(
            config.validate_configuration().unwrap(),
            "Configured providers: openai, groq, gemini"
        );
    }

    #[test]
    fn missing_keys_fail_validation_with_instructions() {
        let config = config_from(&[]).unwrap();
        let err = config.validate_configuration().unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY=your_key_here"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("SUPPORTBOT_PROVIDER", "Gemini"),
            ("SUPPORTBOT_CHUNK_SIZE", "800"),
            ("SUPPORTBOT_TOP_K", "5"),
            ("SUPPORTBOT_EMBEDDING_BACKEND", "openai"),
            ("SUPPORTBOT_CHAT_DIR", "/tmp/chats"),
        ])
        .unwrap();
        assert_eq!(config.default_provider, ProviderKind::Gemini);
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.top_k_retrieval, 5);
        assert_eq!(config.embedding_backend, EmbeddingBackend::OpenAi);
        assert_eq!(config.chat_storage_dir, PathBuf::from("/tmp/chats"));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = config_from(&[("SUPPORTBOT_CHUNK_SIZE", "big")]).unwrap_err();
        assert!(err.to_string().contains("SUPPORTBOT_CHUNK_SIZE"));
    }

    #[test]
    fn resolve_provider_falls_back_to_first_available() {
        let config = config_from(&[("OPENAI_API_KEY", "o")]).unwrap();
        assert_eq!(config.resolve_provider(None).unwrap(), ProviderKind::OpenAi);

        let err = config.resolve_provider(Some(ProviderKind::Gemini)).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn prompts_follow_mode() {
        let config = AppConfig::default();
        assert!(config.system_prompt(ResponseMode::Concise).contains("SHORT, CONCISE"));
        assert!(config.system_prompt(ResponseMode::Detailed).contains("step-by-step"));
    }
}

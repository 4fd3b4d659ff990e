//! Provider-agnostic chat facade

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{error, info};

use supportbot_core::{
    AppConfig, ChatMessage, Error, GenerationConfig, LLMProvider, ProviderKind, ResponseMode, Result,
};

use crate::config::ProviderConfig;
use crate::gemini::GeminiClient;
use crate::openai_compatible::OpenAiCompatibleClient;

/// Unified client over every supported provider
///
/// Generation defaults (temperature, token limits, prompts) come from the
/// `AppConfig` the client was built with.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    config: AppConfig,
}

impl LlmClient {
    /// Create a client for `kind`, failing when its API key is not configured
    pub fn new(kind: ProviderKind, config: &AppConfig) -> Result<Self> {
        let provider_config = ProviderConfig::from_app_config(kind, config)?;

        let provider: Arc<dyn LLMProvider> = match kind {
            ProviderKind::OpenAi | ProviderKind::Groq => {
                Arc::new(OpenAiCompatibleClient::new(provider_config)?)
            }
            ProviderKind::Gemini => Arc::new(GeminiClient::new(provider_config)?),
        };

        info!(provider = %kind, model = %provider.model_id(), "LLM client initialized");
        Ok(Self::with_provider(provider, config))
    }

    /// Wrap an already constructed provider
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &AppConfig) -> Self {
        Self {
            provider,
            config: config.clone(),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider.provider()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// Send `messages` as-is and return the trimmed answer
    ///
    /// `temperature` and `max_tokens` fall back to the configured defaults.
    pub async fn generate_response(
        &self,
        messages: &[ChatMessage],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let generation = GenerationConfig {
            model_id: self.provider.model_id().to_string(),
            max_tokens: max_tokens.unwrap_or(self.config.max_tokens),
            temperature: temperature.unwrap_or(self.config.temperature),
            top_p: self.config.top_p,
            timeout: self.config.request_timeout,
        };

        let outcome = match timeout(generation.timeout, self.provider.generate(messages, &generation)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} request timed out after {}s",
                self.provider().display_name(),
                generation.timeout.as_secs_f32()
            ))),
        };

        match outcome {
            Ok(result) => Ok(result.text.trim().to_string()),
            Err(e) => {
                error!(provider = %self.provider(), error = %e, "error generating response");
                Err(e)
            }
        }
    }

    /// High-level chat call: system prompt, history, then the user message
    ///
    /// Without an explicit `system_prompt` the prompt for `mode` is used; the
    /// token limit always follows `mode`.
    pub async fn chat(
        &self,
        user_message: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
        mode: ResponseMode,
    ) -> Result<String> {
        let messages = build_chat_messages(
            system_prompt.unwrap_or_else(|| self.config.system_prompt(mode)),
            history,
            user_message,
        );

        let max_tokens = self.config.max_tokens_for(mode);
        self.generate_response(&messages, None, Some(max_tokens)).await
    }

    /// Whether `kind` has an API key configured
    pub fn is_provider_available(kind: ProviderKind, config: &AppConfig) -> bool {
        config.validate_api_key(kind)
    }

    /// Providers with an API key configured, in menu order
    pub fn available_providers(config: &AppConfig) -> Vec<ProviderKind> {
        config.available_providers()
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider.provider())
            .field("model", &self.provider.model_id())
            .finish()
    }
}

pub(crate) fn build_chat_messages(
    system_prompt: &str,
    history: &[ChatMessage],
    user_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(user_message));
    messages
}

//! LLM provider trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ChatMessage, ProviderKind, Result};

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: String::new(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Result from text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
///
/// Implementations send the full message list, system message first, and
/// return the trimmed answer text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion for a conversation
    async fn generate(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult>;

    /// Default model identifier for this provider
    fn model_id(&self) -> &str;

    fn provider(&self) -> ProviderKind;
}

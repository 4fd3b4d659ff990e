//! OpenAI-compatible chat completion client (`/v1/chat/completions`)
//!
//! Serves both OpenAI and Groq, which expose the same wire format. Wire
//! types are private to this module.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use supportbot_core::{
    ChatMessage, Error, GenerationConfig, GenerationResult, LLMProvider, ProviderKind, Result,
};

use crate::config::ProviderConfig;

/// Client for any endpoint implementing `/v1/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn perform_request(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let payload = build_request(messages, config);

        debug!(
            provider = %self.config.kind,
            model = %payload.model,
            messages = payload.messages.len(),
            max_tokens = payload.max_tokens,
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.config.kind, error = %e, "chat completion request failed");
                Error::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let message = error_message(status.as_u16(), &body);
            error!(provider = %self.config.kind, %status, %message, "chat completion returned HTTP error");
            return Err(if status.as_u16() == 401 {
                Error::Authentication(message)
            } else {
                Error::LLMProvider(message)
            });
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| Error::Serialization(format!("failed to parse response body: {}", e)))?;

        let tokens_used = parsed.usage.as_ref().map(|u| u.total_tokens);
        let text = extract_answer(parsed)?;

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAiCompatibleClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        self.perform_request(messages, config).await
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn provider(&self) -> ProviderKind {
        self.config.kind
    }
}

// Wire types

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

// Error envelope used by OpenAI and Groq
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

pub(crate) fn build_request(
    messages: &[ChatMessage],
    config: &GenerationConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model_id.clone(),
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        top_p: config.top_p,
    }
}

pub(crate) fn extract_answer(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::LLMProvider("empty or missing content in response".to_string()))
}

pub(crate) fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .code
                .map(|v| match v {
                    serde_json::Value::String(s) => format!(" [code={}]", s),
                    other => format!(" [code={}]", other),
                })
                .unwrap_or_default();
            format!("HTTP {}{}: {}", status, code, envelope.error.message)
        }
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

//! Google Gemini client (`models/{model}:generateContent`)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use supportbot_core::{
    ChatMessage, Error, GenerationConfig, GenerationResult, LLMProvider, ProviderKind, Result,
    Role,
};

use crate::config::ProviderConfig;

/// Gemini REST client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: ProviderConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn perform_request(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let payload = build_request(messages, config);
        let url = self.endpoint(&config.model_id);

        debug!(
            model = %config.model_id,
            contents = payload.contents.len(),
            has_system = payload.system_instruction.is_some(),
            "sending Gemini request"
        );

        // The key goes in a header so it never shows up in logged URLs
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gemini request failed");
                Error::Network(e.without_url().to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let message = error_message(status.as_u16(), &body);
            error!(%status, %message, "Gemini returned HTTP error");
            return Err(match status.as_u16() {
                401 | 403 => Error::Authentication(message),
                _ => Error::LLMProvider(message),
            });
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| Error::Serialization(format!("failed to parse response body: {}", e)))?;

        let tokens_used = parsed.usage_metadata.as_ref().and_then(|u| u.total_token_count);
        let text = extract_answer(parsed)?;

        Ok(GenerationResult {
            text,
            model_id: config.model_id.clone(),
            tokens_used,
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
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
        ProviderKind::Gemini
    }
}

// Wire types

#[derive(Debug, Serialize)]
pub(crate) struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Map chat messages onto Gemini's request shape
///
/// System messages are merged into `systemInstruction`; assistant turns use
/// the `model` role.
pub(crate) fn build_request(
    messages: &[ChatMessage],
    config: &GenerationConfig,
) -> GenerateContentRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let system_instruction = (!system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: system.join("\n\n"),
        }],
    });

    let contents = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::System => return None,
                Role::User => "user",
                Role::Assistant => "model",
            };
            Some(Content {
                role: Some(role),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
        })
        .collect();

    GenerateContentRequest {
        system_instruction,
        contents,
        generation_config: WireGenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            top_p: config.top_p,
        },
    }
}

pub(crate) fn extract_answer(response: GenerateContentResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(Error::LLMProvider(format!("Gemini returned no answer: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim().to_string();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        warn!(finish_reason = %reason, "Gemini candidate had no text");
        return Err(Error::LLMProvider(format!(
            "Gemini returned an empty answer (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}

pub(crate) fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(s) => format!("HTTP {} [{}]: {}", status, s, envelope.error.message),
            None => format!("HTTP {}: {}", status, envelope.error.message),
        },
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

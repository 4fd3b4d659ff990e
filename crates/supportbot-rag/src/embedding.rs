//! Embedder implementations

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use supportbot_core::{AppConfig, Embedder, EmbeddingBackend, Error, ProviderKind, Result};

pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Offline feature-hashing embedder
///
/// Each word feeds three buckets weighted by its position, each adjacent word
/// pair feeds one more, and the vector is L2-normalised. md5 keeps the
/// buckets stable across runs so persisted indexes stay valid.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 384;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket_hash(token: &str) -> u64 {
        let digest = md5::compute(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized_text = text.to_lowercase();
        let words: Vec<&str> = normalized_text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let dim = self.dimension as u64;
        let mut embedding = vec![0.0f32; self.dimension];

        for (pos, word) in words.iter().enumerate() {
            let hash = Self::bucket_hash(word);
            let position_weight = 1.0 / (pos as f32 + 1.0);

            embedding[(hash % dim) as usize] += position_weight;
            embedding[((hash >> 16) % dim) as usize] += position_weight * 0.7;
            embedding[((hash >> 32) % dim) as usize] += position_weight * 0.5;
        }

        for pair in words.windows(2) {
            let hash = Self::bucket_hash(&format!("{} {}", pair[0], pair[1]));
            embedding[(hash % dim) as usize] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

/// OpenAI `/v1/embeddings` client
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    url: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            dimension: Self::dimension_for(&model),
            model,
            url: OPENAI_EMBEDDINGS_URL.to_string(),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Output width of the known OpenAI embedding models
    pub fn dimension_for(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, inputs = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            error!(%status, "embedding request failed");
            return Err(Error::Embedding(format!("HTTP {}: {}", status, body)));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the embedder selected by `SUPPORTBOT_EMBEDDING_BACKEND`
pub fn embedder_from_config(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend {
        EmbeddingBackend::Hashing => {
            info!("using offline feature-hashing embeddings");
            Ok(Arc::new(HashingEmbedder::default()))
        }
        EmbeddingBackend::OpenAi => {
            let api_key = config.api_key(ProviderKind::OpenAi).ok_or_else(|| {
                Error::Configuration(
                    "OpenAI embeddings require OPENAI_API_KEY to be set".to_string(),
                )
            })?;
            info!(model = %config.embedding_model, "using OpenAI embeddings");
            Ok(Arc::new(OpenAiEmbedder::new(api_key, &config.embedding_model)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_text("How do I return an item?");
        let b = embedder.embed_text("how do i return an item");

        assert_eq!(a.len(), 384);
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed_text("  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn openai_backend_needs_key() {
        let config = AppConfig {
            embedding_backend: EmbeddingBackend::OpenAi,
            ..AppConfig::default()
        };
        assert!(embedder_from_config(&config).is_err());
    }

    #[test]
    fn openai_dimensions() {
        assert_eq!(OpenAiEmbedder::dimension_for("text-embedding-3-small"), 1536);
        assert_eq!(OpenAiEmbedder::dimension_for("text-embedding-3-large"), 3072);
    }
}

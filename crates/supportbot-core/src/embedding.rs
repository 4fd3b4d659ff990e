//! Embedder trait

use async_trait::async_trait;

use crate::Result;

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::Error::Embedding("embedder returned no vector".to_string()))
    }

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

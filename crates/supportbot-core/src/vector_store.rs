//! Vector store trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A chunk stored in the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: serde_json::Value,
    /// Squared L2 distance to the query, set on search results only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl VectorDocument {
    /// The `source` metadata entry, usually a file name
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
    }
}

/// Search result from vector store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub documents: Vec<VectorDocument>,
    pub total: usize,
}

/// Configuration for vector search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Drop hits farther away than this squared L2 distance
    pub max_distance: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_distance: None,
        }
    }
}

/// Trait for vector stores
///
/// Results from `search_by_vector` are ordered nearest first; ties keep
/// insertion order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store multiple documents in batch, returning their ids
    async fn store_batch(&self, documents: Vec<VectorDocument>) -> Result<Vec<String>>;

    /// Search using a vector embedding
    async fn search_by_vector(&self, vector: &[f32], config: &SearchConfig) -> Result<SearchResult>;

    /// Clear all documents from the store
    async fn clear(&self) -> Result<()>;

    /// Get the total number of documents
    async fn count(&self) -> Result<usize>;

    /// Dimension of stored vectors, if any have been stored
    fn dimension(&self) -> Option<usize>;
}

//! RAG (Retrieval-Augmented Generation) engine trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, VectorDocument};

/// Query for RAG retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGQuery {
    pub query: String,
    pub top_k: usize,
    pub max_distance: Option<f32>,
}

impl RAGQuery {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            max_distance: None,
        }
    }
}

impl Default for RAGQuery {
    fn default() -> Self {
        Self::new(String::new(), 3)
    }
}

/// Result from RAG retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RAGResult {
    pub documents: Vec<VectorDocument>,
    pub context: String,
}

impl RAGResult {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Trait for RAG engines
///
/// An engine that has not been initialized, or whose knowledge base is
/// empty, returns an empty result from `retrieve` instead of an error.
#[async_trait]
pub trait RAGEngine: Send + Sync {
    /// Load the persisted index, or build it from the data directory
    async fn initialize(&mut self, force_rebuild: bool) -> Result<()>;

    /// Retrieve relevant chunks and the formatted context for a query
    async fn retrieve(&self, query: &RAGQuery) -> Result<RAGResult>;

    /// Build context from retrieved documents
    fn build_context(&self, documents: &[VectorDocument]) -> String;

    /// Get statistics about the RAG engine
    async fn stats(&self) -> Result<serde_json::Value>;

    /// Check if the RAG engine is ready
    fn is_ready(&self) -> bool;

    /// Number of indexed chunks
    fn chunk_count(&self) -> usize;
}

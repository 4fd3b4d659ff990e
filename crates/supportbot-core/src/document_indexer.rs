//! Document indexer trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// A loaded document, before chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// File name the text came from
    pub source: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Result of an indexing operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub documents_failed: usize,
    pub errors: Vec<String>,
}

impl IndexingResult {
    pub fn merge(&mut self, other: IndexingResult) {
        self.documents_indexed += other.documents_indexed;
        self.chunks_indexed += other.chunks_indexed;
        self.documents_failed += other.documents_failed;
        self.errors.extend(other.errors);
    }
}

/// Configuration for document indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks embedded per embedder call
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            batch_size: 32,
        }
    }
}

impl IndexingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch_size must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Trait for document indexers
///
/// Loads documents, splits them into chunks, embeds them and writes them
/// into a vector store.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    /// Index multiple documents
    async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexingResult>;

    /// Index a single local file
    async fn index_from_file(&self, path: &Path) -> Result<IndexingResult>;

    /// Index every supported file in a directory
    async fn index_directory(&self, dir: &Path) -> Result<IndexingResult>;
}

//! Retrieval-augmented generation for the support chatbot
//!
//! This crate provides the chunker, the embedders, an exact flat L2 vector
//! index, the directory indexer and the `RagPipeline` that ties them together.

mod chunker;
mod document_indexer;
mod embedding;
mod engine;
mod vector_store;

#[cfg(test)]
mod tests;

pub use chunker::chunk_text;
pub use document_indexer::{DirectoryIndexer, SUPPORTED_EXTENSIONS, load_document};
pub use embedding::{HashingEmbedder, OpenAiEmbedder, embedder_from_config};
pub use engine::RagPipeline;
pub use vector_store::FlatL2Index;

// Re-export core types for convenience
pub use supportbot_core::{
    Document, DocumentIndexer, Embedder, Error, IndexingConfig, IndexingResult, RAGEngine,
    RAGQuery, RAGResult, Result, SearchConfig, SearchResult, VectorDocument, VectorStore,
};

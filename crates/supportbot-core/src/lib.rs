//! Core traits and types for the support chatbot
//!
//! This crate defines the fundamental traits and types used across the workspace.
//! It provides capability-facing interfaces for LLM providers, RAG engines, vector stores,
//! embedders and document indexers, plus the application configuration and the PII scrubber.

pub mod config;
pub mod document_indexer;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod pii;
pub mod rag;
pub mod types;
pub mod vector_store;

pub use config::{AppConfig, EmbeddingBackend};
pub use document_indexer::{Document, DocumentIndexer, IndexingConfig, IndexingResult};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use llm::{GenerationConfig, GenerationResult, LLMProvider};
pub use pii::sanitize_pii;
pub use rag::{RAGEngine, RAGQuery, RAGResult};
pub use types::*;
pub use vector_store::{SearchConfig, SearchResult, VectorDocument, VectorStore};

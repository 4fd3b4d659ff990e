//! Error types for the support chatbot

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("RAG engine error: {0}")]
    RAGEngine(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Document indexer error: {0}")]
    DocumentIndexer(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Web search error: {0}")]
    Search(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

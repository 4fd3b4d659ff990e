//! LLM provider clients for the support chatbot
//!
//! This crate implements the `LLMProvider` trait for OpenAI-compatible chat
//! completion APIs (OpenAI and Groq) and for Google Gemini, and exposes the
//! `LlmClient` facade the rest of the workspace talks to.

mod client;
mod config;
mod gemini;
mod openai_compatible;


pub use client::LlmClient;
pub use config::ProviderConfig;
pub use gemini::GeminiClient;
pub use openai_compatible::OpenAiCompatibleClient;

// Re-export core types for convenience
pub use supportbot_core::{
    ChatMessage, Error, GenerationConfig, GenerationResult, LLMProvider, ProviderKind, Result,
    Role,
};

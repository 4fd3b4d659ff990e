//! Common types used across the support chatbot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Gemini,
}

impl ProviderKind {
    /// All providers, in the order they are offered to the user
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Groq, ProviderKind::Gemini];

    /// Lowercase identifier used in configuration and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::Gemini => "Gemini",
        }
    }

    /// Environment variable holding the API key for this provider
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(Error::InvalidInput(format!(
                "Unsupported provider: {}. Choose from: openai, groq, gemini",
                other
            ))),
        }
    }
}

/// Response style requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Concise,
    #[default]
    Detailed,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Concise => "concise",
            ResponseMode::Detailed => "detailed",
        }
    }

    /// Parse a mode name; anything other than "concise" means detailed.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("concise") {
            ResponseMode::Concise
        } else {
            ResponseMode::Detailed
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message as sent to an LLM: role and content only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Where a piece of answer context came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    KnowledgeBase { source: String },
    Web { source: String, title: String },
}

impl Source {
    /// File name or URL
    pub fn location(&self) -> &str {
        match self {
            Source::KnowledgeBase { source } => source,
            Source::Web { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!("GROQ".parse::<ProviderKind>().unwrap(), ProviderKind::Groq);
        assert_eq!(" openai ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = "claude".parse::<ProviderKind>().unwrap_err();
        assert!(err.to_string().contains("Unsupported provider: claude"));
    }

    #[test]
    fn response_mode_defaults_to_detailed() {
        assert_eq!(ResponseMode::parse_lenient("Concise"), ResponseMode::Concise);
        assert_eq!(ResponseMode::parse_lenient("detailed"), ResponseMode::Detailed);
        assert_eq!(ResponseMode::parse_lenient("verbose"), ResponseMode::Detailed);
    }

    #[test]
    fn sources_serialize_with_type_tag() {
        let kb = Source::KnowledgeBase {
            source: "faq.txt".to_string(),
        };
        let web = Source::Web {
            source: "https://example.com".to_string(),
            title: "Example".to_string(),
        };

        assert_eq!(
            serde_json::to_string(&kb).unwrap(),
            r#"{"type":"knowledge_base","source":"faq.txt"}"#
        );
        assert_eq!(
            serde_json::to_string(&web).unwrap(),
            r#"{"type":"web","source":"https://example.com","title":"Example"}"#
        );
    }
}

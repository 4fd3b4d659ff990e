//! Query rewriting before retrieval

use tracing::{info, warn};

use supportbot_core::{ChatMessage, Role};
use supportbot_llm::LlmClient;

const CONTEXTUALIZE_PROMPT: &str = "You are a query contextualization assistant.
Rewrite the user's latest query to be a standalone question that can be understood without the chat history.
Replace pronouns (it, they, this) with specific entities from the history.
Do NOT answer the question. ONLY output the rewritten query.
If the query is already standalone, output it exactly as is.";

const REFINE_PROMPT: &str = "You are a query refinement assistant. Your task is to correct spelling and grammar mistakes in the user's query and output ONLY the corrected version. Do not add any explanations or extra text. Keep the intent exactly the same.";

/// Messages of history shown to the contextualizer (three turns)
const HISTORY_WINDOW: usize = 6;

const REWRITE_TEMPERATURE: f32 = 0.1;
const REWRITE_MAX_TOKENS: u32 = 100;

/// Rewrite `query` so it can be understood without `history`
///
/// Returns the query unchanged when there is no usable history, when the
/// model fails, or when it answers with nothing.
pub async fn contextualize_query(query: &str, history: &[ChatMessage], llm: &LlmClient) -> String {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let history_str: String = recent
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}\n", m.role.as_str(), m.content))
        .collect();

    if history_str.is_empty() {
        return query.to_string();
    }

    let messages = [
        ChatMessage::system(CONTEXTUALIZE_PROMPT),
        ChatMessage::user(format!(
            "Chat History:\n{}\n\nLatest Query: {}\n\nStandalone Query:",
            history_str, query
        )),
    ];

    match llm
        .generate_response(&messages, Some(REWRITE_TEMPERATURE), Some(REWRITE_MAX_TOKENS))
        .await
    {
        Ok(rewritten) if !rewritten.trim().is_empty() => {
            let rewritten = rewritten.trim().to_string();
            info!(original = %query, contextualized = %rewritten, "contextualized query");
            rewritten
        }
        Ok(_) => query.to_string(),
        Err(e) => {
            warn!(error = %e, "contextualization failed");
            query.to_string()
        }
    }
}

/// Correct spelling and grammar of `query` for better retrieval
pub async fn refine_query(query: &str, llm: &LlmClient) -> String {
    let messages = [ChatMessage::system(REFINE_PROMPT), ChatMessage::user(query)];

    match llm
        .generate_response(&messages, Some(REWRITE_TEMPERATURE), Some(REWRITE_MAX_TOKENS))
        .await
    {
        Ok(refined) if !refined.trim().is_empty() => {
            let refined = refined.trim().to_string();
            if refined.to_lowercase() != query.trim().to_lowercase() {
                info!(original = %query, refined = %refined, "query refined");
            }
            refined
        }
        Ok(_) => query.to_string(),
        Err(e) => {
            warn!(error = %e, "query refinement failed");
            query.to_string()
        }
    }
}

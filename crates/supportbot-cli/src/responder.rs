//! Answer generation: query rewriting, retrieval, web context and the LLM call

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use supportbot_core::{ChatMessage, RAGEngine, RAGQuery, ResponseMode, Source};
use supportbot_llm::LlmClient;

use crate::helpers::format_response;
use crate::query::{contextualize_query, refine_query};
use crate::web_search::{WebSearch, format_search_results};

/// Web hits added to the prompt when web search is enabled
pub const WEB_RESULTS_PER_ANSWER: usize = 3;

/// An answer and the sources that informed it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Builds answers from the knowledge base, the web and the LLM
#[derive(Clone)]
pub struct Responder {
    llm: LlmClient,
    rag: Option<Arc<dyn RAGEngine>>,
    web: Option<Arc<dyn WebSearch>>,
    top_k: usize,
}

impl Responder {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            rag: None,
            web: None,
            top_k: 3,
        }
    }

    pub fn with_rag(mut self, rag: Arc<dyn RAGEngine>, top_k: usize) -> Self {
        self.set_rag(Some(rag), top_k);
        self
    }

    pub fn with_web_search(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn set_rag(&mut self, rag: Option<Arc<dyn RAGEngine>>, top_k: usize) {
        self.rag = rag;
        self.top_k = top_k.max(1);
    }

    pub fn set_llm(&mut self, llm: LlmClient) {
        self.llm = llm;
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    pub fn has_knowledge_base(&self) -> bool {
        self.rag.as_ref().is_some_and(|rag| rag.is_ready())
    }

    /// Answer `user_message`
    ///
    /// Rewriting, retrieval and web search degrade to nothing on failure; only
    /// a failed LLM call turns into an error reply, which carries no sources.
    pub async fn respond(
        &self,
        user_message: &str,
        mode: ResponseMode,
        use_web_search: bool,
        history: &[ChatMessage],
    ) -> Reply {
        let mut search_query = user_message.to_string();
        if !history.is_empty() {
            search_query = contextualize_query(&search_query, history, &self.llm).await;
        }
        let search_query = refine_query(&search_query, &self.llm).await;

        let mut context = String::new();
        let mut sources = Vec::new();

        if let Some(rag) = &self.rag {
            match rag.retrieve(&RAGQuery::new(search_query.as_str(), self.top_k)).await {
                Ok(result) if !result.context.is_empty() => {
                    context = format!("**Context Information:**\n{}\n\n", result.context);
                    sources.extend(result.documents.iter().map(|doc| Source::KnowledgeBase {
                        source: doc.source().to_string(),
                    }));
                    info!(chunks = result.documents.len(), "RAG context retrieved");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "RAG retrieval failed"),
            }
        }

        if use_web_search {
            if let Some(web) = &self.web {
                let hits = web.search(&search_query, WEB_RESULTS_PER_ANSWER).await;
                if !hits.is_empty() {
                    context.push_str(&format!(
                        "**Additional Context:**\n{}\n\n",
                        format_search_results(&hits)
                    ));
                    sources.extend(hits.into_iter().map(|hit| Source::Web {
                        source: hit.link,
                        title: hit.title,
                    }));
                    info!("web search context retrieved");
                }
            }
        }

        let message = if context.is_empty() {
            user_message.to_string()
        } else {
            format!("{}**User Question:** {}", context, user_message)
        };

        match self.llm.chat(&message, None, history, mode).await {
            Ok(answer) => Reply {
                text: format_response(&answer),
                sources,
            },
            Err(e) => {
                error!(error = %e, "error generating response");
                Reply {
                    text: format!("⚠️ Error generating response: {}", e),
                    sources: Vec::new(),
                }
            }
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("llm", &self.llm)
            .field("rag", &self.rag.is_some())
            .field("web", &self.web.is_some())
            .field("top_k", &self.top_k)
            .finish()
    }
}

//! Conversation layer and terminal front end for the support chatbot
//!
//! Everything between the user and the LLM lives here: query rewriting,
//! web search, answer assembly, session files, product recommendations,
//! retention cleanup, logging setup and the REPL widgets.

pub mod helpers;
pub mod logging;
pub mod query;
pub mod recommendation;
pub mod responder;
pub mod retention;
pub mod session;
pub mod ui;
pub mod web_search;


pub use query::{contextualize_query, refine_query};
pub use recommendation::{
    BehaviorAnalyzer, EngagementLevel, Product, Recommendation, RecommendationEngine, UserProfile,
};
pub use responder::{Reply, Responder};
pub use retention::{RetentionReport, cleanup_old_sessions};
pub use session::{ChatManager, ChatSession, SessionSummary, StoredMessage};
pub use web_search::{DuckDuckGoSearch, SearchHit, WebSearch, get_web_context};

// Re-export core types
pub use supportbot_core::{Error, Result};

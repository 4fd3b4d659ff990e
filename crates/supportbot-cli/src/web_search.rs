//! DuckDuckGo web search with keyword-based safe filtering

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use supportbot_core::{AppConfig, Error, Result};

pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Keywords that mark a result as unsuitable for a store assistant
pub const SAFE_SEARCH_BLACKLIST: &[&str] = &[
    "porn", "xxx", "sex", "adult", "nude", "erotic", "hentai",
    "gambling", "casino", "betting",
    "violence", "gore", "kill", "murder",
    "hack", "crack", "warez",
    "drug", "cocaine", "heroin",
    "dating", "escort",
];

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// `false` when any blacklisted keyword occurs in `text`, ignoring case
pub fn is_safe_content(text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let lower = text.to_lowercase();
    !SAFE_SEARCH_BLACKLIST.iter().any(|keyword| lower.contains(keyword))
}

/// Web search backend
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `max_results` safe hits; failures are logged and yield nothing
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit>;
}

/// Scrapes the DuckDuckGo HTML endpoint with strict safe-search
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
    result_cap: usize,
}

impl DuckDuckGoSearch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: DUCKDUCKGO_HTML_URL.to_string(),
            result_cap: usize::MAX,
        })
    }

    /// Timeout and result cap from the application settings
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.search_timeout)?.with_result_cap(config.max_search_results))
    }

    /// Never return more than `cap` hits, whatever the caller asks for
    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap.max(1);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query), ("kp", "1")])
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Search(format!("DuckDuckGo returned HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        Ok(parse_results(&body, limit))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Vec<SearchHit> {
        info!(query = %query, "performing web search");
        let max_results = max_results.min(self.result_cap);

        // Fetch extra results so filtering still leaves enough
        match self.fetch(query, max_results * 2).await {
            Ok(hits) => filter_safe(hits, max_results),
            Err(e) => {
                error!(error = %e, "web search error");
                Vec::new()
            }
        }
    }
}

/// Keep safe hits, in order, until `max_results` are collected
pub fn filter_safe(hits: Vec<SearchHit>, max_results: usize) -> Vec<SearchHit> {
    let mut kept = Vec::new();
    let mut blocked = 0;

    for hit in hits {
        if kept.len() >= max_results {
            break;
        }
        if is_safe_content(&hit.title) && is_safe_content(&hit.snippet) && is_safe_content(&hit.link) {
            kept.push(hit);
        } else {
            blocked += 1;
            warn!(link = %hit.link, "blocked unsafe result");
        }
    }

    info!(found = kept.len(), blocked, "web search finished");
    kept
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a DuckDuckGo HTML results page, skipping ads
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for result in document.select(&result_sel) {
        if hits.len() >= limit {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }

        let Some(anchor) = result.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let title = element_text(anchor);
        let link = decode_result_link(href);
        if title.is_empty() || link.is_empty() {
            continue;
        }

        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No description".to_string());

        hits.push(SearchHit {
            title,
            link,
            snippet,
        });
    }

    hits
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links to the target URL
pub fn decode_result_link(href: &str) -> String {
    let Ok(base) = Url::parse("https://duckduckgo.com/") else {
        return href.to_string();
    };

    match base.join(href) {
        Ok(url) if url.path().starts_with("/l/") => url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned())
            .unwrap_or_else(|| url.to_string()),
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Numbered block of results for prompt context
pub fn format_search_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No web search results found.".to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(idx, hit)| {
            format!(
                "{}. {}\n   {}\n   URL: {}",
                idx + 1,
                hit.title,
                hit.snippet,
                hit.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Search and format the results, `None` when nothing was found
pub async fn get_web_context(
    search: &dyn WebSearch,
    query: &str,
    max_results: usize,
) -> Option<String> {
    let hits = search.search(query, max_results).await;
    if hits.is_empty() {
        warn!("no web search results found");
        return None;
    }
    Some(format!("Web Search Results:\n\n{}", format_search_results(&hits)))
}

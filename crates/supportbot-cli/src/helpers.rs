//! Text utilities shared by the responder and the UI

use regex::Regex;
use std::sync::LazyLock;

use supportbot_core::Source;

static EXCESS_NEWLINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());

/// Title length before a session title gets truncated
pub const TITLE_MAX_CHARS: usize = 30;

/// Trim the answer and collapse runs of blank lines
pub fn format_response(response: &str) -> String {
    let response = response.trim();
    match EXCESS_NEWLINES.as_ref() {
        Some(re) => re.replace_all(response, "\n\n").into_owned(),
        None => response.to_string(),
    }
}

/// Cut `text` to at most `max_length` characters, ending with `suffix`
pub fn truncate_text(text: &str, max_length: usize, suffix: &str) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let keep = max_length.saturating_sub(suffix.chars().count());
    let head: String = text.chars().take(keep).collect();
    format!("{}{}", head.trim(), suffix)
}

/// Collapse all whitespace runs into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Numbered source list, empty when there are no sources
pub fn format_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut formatted = String::from("Sources:\n");
    for (idx, source) in sources.iter().enumerate() {
        formatted.push_str(&format!("{}. {}\n", idx + 1, source.location()));
    }
    formatted
}

/// Rough token count, four characters per token
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

pub fn build_prompt_with_context(query: &str, context: &str, system_prompt: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        parts.push(system.to_string());
    }
    if !context.is_empty() {
        parts.push(format!("Context Information:\n{}", context));
    }
    parts.push(format!("User Question: {}", query));
    parts.join("\n\n")
}

/// Session title derived from the first user message
pub fn session_title(first_message: &str) -> String {
    let first_message = first_message.trim();
    if first_message.chars().count() > TITLE_MAX_CHARS {
        let head: String = first_message.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        first_message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn response_blank_lines_collapse() {
        assert_eq!(format_response("\n  Hi.\n\n\n\nBye.  \n"), "Hi.\n\nBye.");
        assert_eq!(format_response("One\n\nTwo"), "One\n\nTwo");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_text("short", 10, "..."), "short");
        assert_eq!(truncate_text("The quick brown fox", 10, "..."), "The qui...");
        assert_eq!(truncate_text("ab cd ef", 6, "..."), "ab...");
    }

    #[test]
    fn whitespace_is_cleaned() {
        assert_eq!(clean_text("  a \n\t b   c "), "a b c");
    }

    #[test]
    fn sources_are_numbered() {
        let sources = vec![
            Source::KnowledgeBase {
                source: "faq.txt".to_string(),
            },
            Source::Web {
                source: "https://shop.example/returns".to_string(),
                title: "Returns".to_string(),
            },
        ];
        assert_snapshot!(format_sources(&sources).trim_end(), @r"
        Sources:
        1. faq.txt
        2. https://shop.example/returns
        ");
        assert_eq!(format_sources(&[]), "");
    }

    #[test]
    fn prompt_with_context() {
        assert_snapshot!(
            build_prompt_with_context("Where is my order?", "Orders ship in 2 days.", Some("Be brief.")),
            @r"
        Be brief.

        Context Information:
        Orders ship in 2 days.

        User Question: Where is my order?
        "
        );
        assert_eq!(build_prompt_with_context("Hi", "", None), "User Question: Hi");
    }

    #[test]
    fn titles() {
        assert_eq!(session_title("Where is my order?"), "Where is my order?");
        assert_eq!(
            session_title("I would like to know about the return policy for shoes"),
            "I would like to know about the..."
        );
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}

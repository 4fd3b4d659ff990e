//! PII scrubbing for text that leaves the process (logs, exports)

use regex::Regex;
use std::sync::LazyLock;

static PII_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\b\d{3}-\d{2}-\d{4}\b", "[SSN-REDACTED]"),
        (r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b", "[CC-REDACTED]"),
        (
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
            "[EMAIL-REDACTED]",
        ),
        (r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", "[PHONE-REDACTED]"),
        (r"\bAPIKEY[:\s]+[\w-]+", "[APIKEY-REDACTED]"),
        (r"\b(sk|pk)[-_][a-zA-Z0-9]{20,}\b", "[TOKEN-REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        Regex::new(&format!("(?i){}", pattern))
            .ok()
            .map(|re| (re, replacement))
    })
    .collect()
});

/// Replace personally identifiable information with redaction markers
///
/// Patterns are applied in order, so a card number is never half-matched
/// as a phone number.
pub fn sanitize_pii(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut sanitized = text.to_string();
    for (pattern, replacement) in PII_PATTERNS.iter() {
        if pattern.is_match(&sanitized) {
            sanitized = pattern.replace_all(&sanitized, *replacement).into_owned();
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        assert_eq!(PII_PATTERNS.len(), 6);
    }

    #[test]
    fn redacts_common_identifiers() {
        let text = "SSN 123-45-6789, card 4111 1111 1111 1111, mail jane.doe@example.com, call 555-123-4567";
        insta::assert_snapshot!(sanitize_pii(text), @"SSN [SSN-REDACTED], card [CC-REDACTED], mail [EMAIL-REDACTED], call [PHONE-REDACTED]");
    }

    #[test]
    fn redacts_keys_and_tokens() {
        assert_eq!(sanitize_pii("apikey abc-123"), "[APIKEY-REDACTED]");
        assert_eq!(
            sanitize_pii("token sk-abcdefghijklmnopqrstuvwxyz"),
            "token [TOKEN-REDACTED]"
        );
    }

    #[test]
    fn key_patterns_match_whole_words_only() {
        for text in [
            "task-abcdefghijklmnopqrstuvwxyz",
            "desk_ABCDEFGHIJKLMNOPQRSTUV",
            "myapikey: foo",
        ] {
            assert_eq!(sanitize_pii(text), text);
        }
        assert_eq!(
            sanitize_pii("key=pk_ABCDEFGHIJKLMNOPQRSTUV"),
            "key=[TOKEN-REDACTED]"
        );
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let text = "Order #1234 ships in 3-5 business days.";
        assert_eq!(sanitize_pii(text), text);
        assert_eq!(sanitize_pii(""), "");
    }
}

//! Fixed-size overlapping text windows

/// Split `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one
///
/// Chunks are trimmed and whitespace-only windows are dropped. Sizes count
/// `char`s, so multi-byte text is never split inside a code point.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        start += step;
    }

    chunks
}

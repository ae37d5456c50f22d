//! Token estimation.

/// Approximate characters per token for English text.
const CHARS_PER_TOKEN: usize = 4;

/// Estimates the LLM token count of `text`.
///
/// Rough estimation: one token per four characters, rounded up, so any
/// non-empty text costs at least one token.
///
/// # Examples
///
/// ```rust
/// use cortex::tokens::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_characters_not_bytes() {
        // Four two-byte characters are still one token.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }
}

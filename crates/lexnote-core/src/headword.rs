//! Headword normalization
//!
//! The normalized headword is the join key between words and cached
//! dictionary entries: lowercase, with leading and trailing non-word
//! characters stripped. Candidates that cannot produce a usable key are
//! rejected before any row is written.

use thiserror::Error;

/// Maximum accepted raw length for a word candidate, in characters.
pub const MAX_HEADWORD_LEN: usize = 40;

/// Reasons a word candidate is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeadwordError {
    /// Raw selection exceeds the length cap
    #[error("word is too long (max {MAX_HEADWORD_LEN} characters)")]
    TooLong,

    /// Selection spans more than one token
    #[error("selection must be a single word")]
    ContainsWhitespace,

    /// Nothing left after stripping boundary punctuation
    #[error("selection contains no letters or digits")]
    Empty,
}

/// Normalize a headword into its join-key form.
///
/// Trims the input, strips leading and trailing non-alphanumeric
/// characters, and lowercases the rest, repeating until the string
/// stops changing. Lowercasing can itself expose strippable boundary
/// characters (`"İ"` lowercases to `i` plus a combining dot), so a
/// single pass would not be idempotent. Returns `None` when nothing
/// remains.
pub fn normalize(raw: &str) -> Option<String> {
    let mut current = raw.to_string();
    loop {
        let next = current
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        None
    } else {
        Some(current)
    }
}

/// Validate a word candidate and produce its normalized form.
///
/// Enforces the acceptance rules for "add to vocabulary": at most
/// [`MAX_HEADWORD_LEN`] characters, a single token (no internal
/// whitespace), and a non-empty normalized form.
pub fn validate(raw: &str) -> Result<String, HeadwordError> {
    if raw.chars().count() > MAX_HEADWORD_LEN {
        return Err(HeadwordError::TooLong);
    }

    let trimmed = raw.trim();
    if trimmed.chars().any(char::is_whitespace) {
        return Err(HeadwordError::ContainsWhitespace);
    }

    normalize(trimmed).ok_or(HeadwordError::Empty)
}

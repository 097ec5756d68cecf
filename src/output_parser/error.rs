//! Error types for the output parser.

/// Errors returned when model output cannot be read as JSON.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The LLM response was empty or whitespace-only.
    #[error("empty LLM response")]
    EmptyResponse,

    /// Neither a `{...}` nor a `[...]` span was present.
    #[error("no JSON object or array found")]
    NoJson,

    /// A candidate was found but failed to parse or deserialize.
    #[error("{reason}")]
    Invalid {
        /// The serde error message.
        reason: String,
        /// A truncated copy of the candidate text (max 200 chars).
        raw: String,
    },
}

/// Truncate to at most `max_chars` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

//! Error taxonomy for a daily run.
//!
//! Only the failures a caller has to tell apart get a typed variant here;
//! everything else travels as [`anyhow::Error`] with context attached.
//!
//! | Variant | Recovery |
//! |---------|----------|
//! | [`IdeaError::Configuration`] | fatal, raised before any external call |
//! | [`IdeaError::HistoryUnavailable`] | recovered by the store: degrades to an empty history |
//! | [`IdeaError::Generation`] | fatal, carries a bounded preview of the last response |
//! | [`IdeaError::Delivery`] | fatal, never retried |

/// Typed failures of the idea pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IdeaError {
    #[error("missing required environment variable: {0}")]
    Configuration(String),

    #[error("history store unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("invalid JSON after retry. Preview:\n{preview}")]
    Generation { preview: String },

    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Returns at most `max_chars` characters of `text`, cut on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

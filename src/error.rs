//! Error types for the chat pipeline.
//!
//! Avatar control failures live in [`crate::avatar::error::AvatarError`] and
//! never convert into [`ChatError`]: the two paths are kept apart so a broken
//! control integration cannot fail a conversation turn.

/// Top-level error type for the chat stream path.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request to the chat endpoint could not be sent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The chat endpoint answered with a non-success status.
    #[error("chat endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly empty).
        body: String,
    },

    /// Audio decoding or output failed.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;

//! Error types for chat sessions, completion providers and persistence.

/// Errors raised by a completion provider.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// API key not configured.
    #[error("API key not configured")]
    ApiKeyMissing,

    /// Transport-level error (connection refused, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered but reported failure.
    #[error("completion failed: {0}")]
    Rejected(String),

    /// The provider answered with no content.
    #[error("empty response from model")]
    EmptyResponse,

    /// Provider could not be configured.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Errors raised by the session controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Submitted text was blank.
    #[error("message is empty")]
    EmptyMessage,

    /// A send is already in flight for this session.
    #[error("a message is already being sent")]
    Busy,

    /// There is no conversation to work from.
    #[error("conversation is empty")]
    EmptyConversation,

    /// No message with this ID exists in either history.
    #[error("message not found: {0}")]
    NotFound(String),

    /// Only summaries and artifacts may be deleted.
    #[error("message {0} is a conversation turn and cannot be deleted")]
    NotDeletable(String),
}

/// Errors raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Key cannot be mapped onto the backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for completion calls.
pub type Result<T> = std::result::Result<T, CompletionError>;

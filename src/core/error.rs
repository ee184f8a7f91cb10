//! Error types for the core module.

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown export format or surface name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Session rule violated (unknown or protected message).
    #[error(transparent)]
    Chat(#[from] chat_core::ChatError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] chat_core::StorageError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

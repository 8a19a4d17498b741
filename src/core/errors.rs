//! Error types for the chat client core.

use thiserror::Error;

/// Chat client error type.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Login or registration input was rejected.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// The assistant exchange for a message failed.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// Storage key cannot be mapped to a blob location.
    #[error("invalid storage key: {0}")]
    InvalidStorageKey(String),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

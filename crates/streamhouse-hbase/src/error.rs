//! Error types for the HBase sink.
//!
//! Configuration and bootstrap errors are fatal at startup. Write errors fail
//! a whole flushed chunk so the caller can redeliver it.

use thiserror::Error;

/// Errors that can occur while configuring, bootstrapping, or running the sink.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The table existence check or table creation failed at startup.
    #[error("Bootstrap error: {0}")]
    BootstrapError(String),

    /// A row write failed while flushing a chunk.
    #[error("Write error: {0}")]
    WriteError(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to reach the storage backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The storage backend rejected a request.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// I/O error (file, network, etc).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}

impl From<bincode::Error> for ConnectorError {
    fn from(e: bincode::Error) -> Self {
        ConnectorError::SerializationError(e.to_string())
    }
}

impl ConnectorError {
    /// Whether a failed flush with this error may succeed if the chunk is
    /// delivered again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::WriteError(_)
                | ConnectorError::ConnectionError(_)
                | ConnectorError::BackendError(_)
                | ConnectorError::IoError(_)
        )
    }
}

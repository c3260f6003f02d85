//! Error types for the transport crate.

/// Errors raised while opening or using a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint URL could not be used
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// The handshake was rejected or could not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The connection failed after it was established
    #[error("Network error: {0}")]
    Network(String),

    /// The stream ended without a close frame
    #[error("Connection stream ended unexpectedly")]
    StreamEnded,

    /// The connection has already been closed
    #[error("Connection is closed")]
    Closed,
}

/// Convenience type alias for Results using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;

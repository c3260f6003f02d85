//! Error types for the phasewatch-stream crate.

use std::time::Duration;

/// Errors produced by the real-time session.
///
/// Connection-level variants are surfaced to consumers through
/// `last_error` and the error hook. `MalformedPayload` and
/// `OperationWhileDisconnected` are only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// The handshake failed or timed out
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// What went wrong
        reason: String,
    },

    /// An established connection broke
    #[error("Transport error: {reason}")]
    Transport {
        /// What went wrong
        reason: String,
    },

    /// Reconnection gave up
    #[error("Gave up reconnecting after {attempts} attempts")]
    MaxReconnectAttemptsExceeded {
        /// Number of retries that were made
        attempts: u32,
    },

    /// The server reported an error
    #[error("Server error: {message}")]
    ServerError {
        /// Message from the server
        message: String,
        /// Optional server error code
        code: Option<String>,
    },

    /// An inbound payload did not match any known shape
    #[error("Malformed payload: {reason}")]
    MalformedPayload {
        /// What was wrong with it
        reason: String,
    },

    /// A control message was issued with no active connection
    #[error("Cannot {operation} while disconnected")]
    OperationWhileDisconnected {
        /// The dropped operation
        operation: &'static str,
    },

    /// The session task has exited
    #[error("Session task is no longer running")]
    SessionClosed,
}

impl RealtimeError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::MaxReconnectAttemptsExceeded { .. } => "MAX_RECONNECT_ATTEMPTS_EXCEEDED",
            Self::ServerError { .. } => "SERVER_ERROR",
            Self::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
            Self::OperationWhileDisconnected { .. } => "OPERATION_WHILE_DISCONNECTED",
            Self::SessionClosed => "SESSION_CLOSED",
        }
    }

    /// True once reconnection has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MaxReconnectAttemptsExceeded { .. })
    }

    /// Whether this error reaches `last_error` and the error hook.
    pub fn is_surfaced(&self) -> bool {
        !matches!(
            self,
            Self::MalformedPayload { .. } | Self::OperationWhileDisconnected { .. }
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No endpoint URL was given
    #[error("Endpoint URL must not be empty")]
    EmptyUrl,

    /// A capacity was set to zero
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    /// The connection timeout was zero
    #[error("Connection timeout must be greater than zero")]
    ZeroTimeout,

    /// The heartbeat interval is zero or not shorter than the idle timeout
    #[error("Heartbeat interval {interval:?} must be non-zero and shorter than idle timeout {idle:?}")]
    HeartbeatInverted {
        /// Configured heartbeat interval
        interval: Duration,
        /// Configured idle timeout
        idle: Duration,
    },

    /// The backoff base is larger than its ceiling
    #[error("Reconnect base delay {base:?} exceeds maximum delay {max:?}")]
    BackoffInverted {
        /// Configured base delay
        base: Duration,
        /// Configured ceiling
        max: Duration,
    },
}

/// Convenience type alias for Results using RealtimeError.
pub type Result<T> = std::result::Result<T, RealtimeError>;

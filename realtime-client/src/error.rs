//! Error types for the phasewatch-realtime crate.

use phasewatch_stream::{ConfigError, RealtimeError};
use thiserror::Error;
use ws_transport::TransportError;

/// Errors that can occur in the realtime client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The session configuration was rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The endpoint URL could not be used
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] TransportError),

    /// The background worker could not be started
    #[error("Failed to start realtime worker: {0}")]
    WorkerStartup(String),

    /// The background worker has stopped
    #[error("Realtime worker is no longer running")]
    WorkerDisconnected,

    /// The session reported an error
    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

impl ClientError {
    /// Stable code of the underlying session error, if there is one.
    pub fn realtime_code(&self) -> Option<&'static str> {
        match self {
            ClientError::Realtime(e) => Some(e.code()),
            _ => None,
        }
    }
}

/// Result type for realtime client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::WorkerStartup("no threads".to_string());
        assert_eq!(err.to_string(), "Failed to start realtime worker: no threads");

        let err: ClientError = ConfigError::EmptyUrl.into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Endpoint URL must not be empty"
        );

        let err: ClientError = RealtimeError::SessionClosed.into();
        assert_eq!(err.to_string(), "Session task is no longer running");
        assert_eq!(err.realtime_code(), Some("SESSION_CLOSED"));
        assert_eq!(ClientError::WorkerDisconnected.realtime_code(), None);
    }
}

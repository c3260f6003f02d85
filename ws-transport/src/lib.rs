//! Generic WebSocket transport for receiving real-time update frames.
//!
//! This crate owns the physical connection and nothing else. It has no
//! knowledge of topics, payload shapes or reconnection; it moves text frames
//! in both directions and reports how a connection ended.
//!
//! # Overview
//!
//! - [`Connector`]: opens a new physical connection. One call, one handshake.
//! - [`Transport`]: an established connection. Sends text frames and yields
//!   [`Inbound`] items until the peer closes or the network fails.
//! - [`WsConnector`]: the tokio-tungstenite implementation used in production.
//!
//! The distinction between a deliberate close and a network failure matters
//! to callers: a close frame from the peer is reported as
//! [`Inbound::Closed`], while a broken or silently ended stream is reported
//! as a [`TransportError`].
//!
//! # Example
//!
//! ```no_run
//! use ws_transport::{Connector, Inbound, WsConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ws_transport::TransportError> {
//!     let connector = WsConnector::new("ws://127.0.0.1:3001/realtime")?;
//!     let mut transport = connector.connect().await?;
//!
//!     transport
//!         .send_text(r#"{"event":"subscribe-location","data":"tokyo"}"#.to_string())
//!         .await?;
//!
//!     while let Ok(Inbound::Text(frame)) = transport.recv().await {
//!         println!("frame: {frame}");
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod ws;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{Result, TransportError};
pub use ws::{WsConnector, WsTransport};

use std::fmt;

use async_trait::async_trait;

/// An item read from an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete text frame.
    Text(String),
    /// The peer answered a heartbeat ping.
    Pong,
    /// The peer closed the connection on purpose.
    Closed(CloseReason),
}

/// Why the peer closed a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Human-readable description supplied by the peer.
    pub message: String,
    /// WebSocket close code, if the peer sent one.
    pub code: Option<u16>,
}

impl CloseReason {
    /// Create a close reason without a close code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a close reason with a close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code: {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// An established, bidirectional connection.
///
/// Implementations are driven by a single task; they do not need to be
/// shareable. `recv` must be cancel safe because callers race it against
/// other work with `tokio::select!`.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Wait for the next inbound item.
    async fn recv(&mut self) -> Result<Inbound>;

    /// Send a heartbeat ping. The answer arrives through `recv` as
    /// [`Inbound::Pong`].
    async fn ping(&mut self) -> Result<()>;

    /// Close the connection. Errors are swallowed; the connection is gone either way.
    async fn close(&mut self);
}

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform one handshake and return the established connection.
    async fn connect(&self) -> Result<Box<dyn Transport>>;

    /// Endpoint description used in log lines.
    fn endpoint(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_display() {
        let reason = CloseReason::new("going away");
        assert_eq!(reason.to_string(), "going away");
        assert_eq!(reason.code, None);

        let reason = CloseReason::with_code("normal closure", 1000);
        assert_eq!(reason.to_string(), "normal closure (code: 1000)");
    }

    #[test]
    fn test_inbound_equality() {
        assert_eq!(
            Inbound::Text("a".to_string()),
            Inbound::Text("a".to_string())
        );
        assert_ne!(
            Inbound::Text("a".to_string()),
            Inbound::Closed(CloseReason::new("a"))
        );
    }
}

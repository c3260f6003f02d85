//! Scripted in-memory connector for tests.
//!
//! [`MockConnector`] plays the server side of a connection. Tests decide how
//! each handshake ends, push frames to the client, drop or close the
//! connection, and inspect every frame the client sent. Pings are answered
//! until [`MockConnector::go_silent`] is called.
//!
//! ```
//! use ws_transport::testing::{ConnectOutcome, MockConnector};
//!
//! let connector = MockConnector::new();
//! connector.script([ConnectOutcome::Refuse("boom".into()), ConnectOutcome::Accept]);
//! assert_eq!(connector.attempts(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Result, TransportError};
use crate::{CloseReason, Connector, Inbound, Transport};

/// How a scripted handshake ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake succeeds
    Accept,
    /// Handshake fails with the given reason
    Refuse(String),
    /// Handshake never completes
    Hang,
    /// Handshake succeeds after the given delay
    Delay(Duration),
}

/// A frame sent by the client, tagged with the connection it was sent on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// 1-based index of the accepted connection
    pub connection: u32,
    /// Raw frame text
    pub text: String,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<ConnectOutcome>,
    attempt_times: Vec<Instant>,
    accepted: u32,
    live: Option<mpsc::UnboundedSender<Result<Inbound>>>,
    sent: Vec<SentFrame>,
    pings: u32,
    silent: bool,
    client_closes: u32,
}

/// Server side of scripted in-memory connections.
///
/// Cloning yields another handle to the same server state. Handshakes follow
/// the script in order; once the script is exhausted every handshake is
/// accepted.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    /// Create a connector that accepts every handshake.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append handshake outcomes to the script.
    pub fn script(&self, outcomes: impl IntoIterator<Item = ConnectOutcome>) {
        self.lock().script.extend(outcomes);
    }

    /// Number of handshakes attempted so far.
    pub fn attempts(&self) -> usize {
        self.lock().attempt_times.len()
    }

    /// When each handshake was attempted.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.lock().attempt_times.clone()
    }

    /// Number of handshakes that were accepted.
    pub fn accepted(&self) -> u32 {
        self.lock().accepted
    }

    /// Whether a connection is currently open from the server's point of view.
    pub fn is_live(&self) -> bool {
        self.lock().live.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Number of heartbeat pings the client has sent.
    pub fn pings(&self) -> u32 {
        self.lock().pings
    }

    /// Stop answering pings on the current connection without closing it.
    pub fn go_silent(&self) {
        self.lock().silent = true;
    }

    /// How many times the client closed a connection.
    pub fn client_closes(&self) -> u32 {
        self.lock().client_closes
    }

    /// Every frame the client has sent, across all connections.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.lock().sent.clone()
    }

    /// Text of the frames sent on one connection.
    pub fn sent_on(&self, connection: u32) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|f| f.connection == connection)
            .map(|f| f.text.clone())
            .collect()
    }

    /// Push a text frame to the client. Returns false if no connection is open.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Ok(Inbound::Text(text.into())))
    }

    /// Close the current connection with a close frame.
    pub fn close_by_server(&self, reason: CloseReason) -> bool {
        let delivered = self.push(Ok(Inbound::Closed(reason)));
        self.lock().live = None;
        delivered
    }

    /// Break the current connection with a network error.
    pub fn drop_connection(&self) -> bool {
        let delivered = self.push(Err(TransportError::Network(
            "connection reset by peer".to_string(),
        )));
        self.lock().live = None;
        delivered
    }

    fn push(&self, item: Result<Inbound>) -> bool {
        match self.lock().live.as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let outcome = {
            let mut state = self.lock();
            state.attempt_times.push(Instant::now());
            state.script.pop_front().unwrap_or(ConnectOutcome::Accept)
        };

        if let ConnectOutcome::Delay(delay) = outcome {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            ConnectOutcome::Accept | ConnectOutcome::Delay(_) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let connection = {
                    let mut state = self.lock();
                    state.accepted += 1;
                    state.live = Some(tx);
                    state.silent = false;
                    state.accepted
                };
                Ok(Box::new(MockTransport {
                    connection,
                    inbound: rx,
                    state: Arc::clone(&self.state),
                    closed: false,
                }))
            }
            ConnectOutcome::Refuse(reason) => Err(TransportError::Handshake(reason)),
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }

    fn endpoint(&self) -> &str {
        "mock://realtime"
    }
}

/// Client side of one scripted connection.
pub struct MockTransport {
    connection: u32,
    inbound: mpsc::UnboundedReceiver<Result<Inbound>>,
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.sent.push(SentFrame {
            connection: self.connection,
            text,
        });
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match self.inbound.recv().await {
            Some(item) => item,
            None => Err(TransportError::StreamEnded),
        }
    }

    async fn ping(&mut self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.pings += 1;
        if !state.silent {
            if let Some(tx) = state.live.as_ref() {
                let _ = tx.send(Ok(Inbound::Pong));
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inbound.close();
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.client_closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outcomes_then_accept() {
        let connector = MockConnector::new();
        connector.script([ConnectOutcome::Refuse("nope".to_string())]);

        match connector.connect().await {
            Err(TransportError::Handshake(reason)) => assert_eq!(reason, "nope"),
            _ => panic!("Expected scripted refusal"),
        }

        let _transport = connector.connect().await.unwrap();
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.accepted(), 1);
        assert!(connector.is_live());
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let connector = MockConnector::new();
        let mut transport = connector.connect().await.unwrap();

        transport.send_text("hello".to_string()).await.unwrap();
        assert_eq!(connector.sent_on(1), vec!["hello".to_string()]);

        assert!(connector.push_text("world"));
        assert_eq!(
            transport.recv().await.unwrap(),
            Inbound::Text("world".to_string())
        );
    }

    #[tokio::test]
    async fn test_server_close_and_network_drop() {
        let connector = MockConnector::new();
        let mut transport = connector.connect().await.unwrap();
        assert!(connector.close_by_server(CloseReason::with_code("bye", 1000)));
        assert_eq!(
            transport.recv().await.unwrap(),
            Inbound::Closed(CloseReason::with_code("bye", 1000))
        );
        assert!(!connector.is_live());

        let mut transport = connector.connect().await.unwrap();
        assert!(connector.drop_connection());
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_pings_answered_until_silent() {
        let connector = MockConnector::new();
        let mut transport = connector.connect().await.unwrap();

        transport.ping().await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), Inbound::Pong);

        connector.go_silent();
        transport.ping().await.unwrap();
        assert_eq!(connector.pings(), 2);
        assert!(connector.push_text("late"));
        // No pong queued ahead of the text frame.
        assert_eq!(
            transport.recv().await.unwrap(),
            Inbound::Text("late".to_string())
        );
        assert!(connector.is_live());
    }

    #[tokio::test]
    async fn test_client_close_is_counted_once() {
        let connector = MockConnector::new();
        let mut transport = connector.connect().await.unwrap();
        transport.close().await;
        transport.close().await;
        assert_eq!(connector.client_closes(), 1);
        assert_eq!(
            transport.send_text("late".to_string()).await,
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_endpoint_and_refusal_reason() {
        let connector = MockConnector::new();
        assert_eq!(connector.endpoint(), "mock://realtime");

        connector.script([ConnectOutcome::Refuse("maintenance".to_string())]);
        match tokio_test::block_on(connector.connect()) {
            Err(e) => assert_eq!(e, TransportError::Handshake("maintenance".to_string())),
            Ok(_) => panic!("Expected scripted refusal"),
        }
        assert!(!connector.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_accept() {
        let connector = MockConnector::new();
        connector.script([ConnectOutcome::Delay(std::time::Duration::from_millis(500))]);
        let start = Instant::now();
        assert!(connector.connect().await.is_ok());
        assert!(start.elapsed() >= std::time::Duration::from_millis(500));
        assert_eq!(connector.accepted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let connector = MockConnector::new();
        connector.script([ConnectOutcome::Hang]);
        let result =
            tokio::time::timeout(std::time::Duration::from_secs(10), connector.connect()).await;
        assert!(result.is_err());
        assert_eq!(connector.attempts(), 1);
    }
}

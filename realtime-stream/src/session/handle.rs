//! Consumer-facing session handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, warn};
use ws_transport::Connector;

use super::driver::SessionDriver;
use super::{Command, SharedState};
use crate::config::SessionConfig;
use crate::error::{ConfigError, RealtimeError, Result};
use crate::event::UpdateEvent;
use crate::hooks::SessionHooks;
use crate::protocol::RefreshRequest;
use crate::recent::RecentEventRecord;
use crate::types::{ConnectionStatus, Topic};

/// Handle to a real-time session.
///
/// Cheap to clone; every clone talks to the same driver. Dropping the last
/// handle stops the driver.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use phasewatch_stream::{Session, SessionConfig, SessionHooks};
/// use ws_transport::WsConnector;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::new("ws://localhost:3001/realtime");
/// let connector = Arc::new(WsConnector::new(&config.url)?);
/// let session = Session::spawn(config, connector, SessionHooks::new())?;
///
/// session.connect().await?;
/// session.subscribe("tokyo");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<SharedState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Session {
    /// Build a session and the driver that must be run for it to do anything.
    ///
    /// Use this when the driver needs to run somewhere other than the current
    /// tokio runtime; otherwise [`Session::spawn`] is simpler.
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        hooks: SessionHooks,
    ) -> std::result::Result<(Session, SessionDriver), ConfigError> {
        config.validate()?;

        let shared = Arc::new(SharedState::new(&config, hooks));
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = SessionDriver::new(config, connector, Arc::clone(&shared), rx);

        Ok((
            Session {
                commands: tx,
                shared,
            },
            driver,
        ))
    }

    /// Build a session and spawn its driver on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        hooks: SessionHooks,
    ) -> std::result::Result<Session, ConfigError> {
        let (session, driver) = Self::new(config, connector, hooks)?;
        tokio::spawn(driver.run());
        Ok(session)
    }

    fn send(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            warn!("Session driver has stopped; command dropped");
            return false;
        }
        true
    }

    /// Open the connection and wait for the outcome of the first attempt.
    ///
    /// Resolves immediately if already connected. If a handshake is in
    /// flight, waits for that one instead of starting another.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::ConnectionFailed`] if the handshake fails, times
    ///   out or is cancelled by [`disconnect`](Self::disconnect)
    /// - [`RealtimeError::SessionClosed`] if the driver is not running
    pub async fn connect(&self) -> Result<()> {
        self.start_connect()
            .await
            .unwrap_or(Err(RealtimeError::SessionClosed))
    }

    /// Queue a connect request and return the channel its outcome arrives on.
    ///
    /// The receiver yields an error if the driver stops before answering.
    pub fn start_connect(&self) -> oneshot::Receiver<Result<()>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { reply });
        rx
    }

    /// Tear down the connection and forget every subscription.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Add a location to the active set.
    ///
    /// Rejected with a warning while `Disconnected`. While a connection is
    /// being pursued the topic is recorded and sent once connected.
    pub fn subscribe(&self, topic: impl Into<Topic>) {
        let topic = topic.into();
        debug!(topic = %topic, "Queueing subscribe");
        self.send(Command::Subscribe(topic));
    }

    /// Remove a location from the active set. Allowed in every state.
    pub fn unsubscribe(&self, topic: impl Into<Topic>) {
        self.send(Command::Unsubscribe(topic.into()));
    }

    /// Ask the server to re-send a time window for a location.
    ///
    /// Dropped with a warning unless connected.
    pub fn request_refresh(
        &self,
        topic: impl Into<Topic>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        self.send(Command::Refresh(RefreshRequest {
            location: topic.into(),
            start_date: start,
            end_date: end,
        }));
    }

    /// Replace every hook at once. The connection is untouched.
    pub fn update_hooks(&self, hooks: SessionHooks) {
        self.send(Command::UpdateHooks(hooks));
    }

    /// Wait until every command queued before this call has been handled.
    pub async fn flush(&self) -> Result<()> {
        self.start_flush()
            .await
            .map_err(|_| RealtimeError::SessionClosed)
    }

    /// Queue a flush marker and return the channel that fires once the
    /// driver reaches it.
    pub fn start_flush(&self) -> oneshot::Receiver<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply });
        rx
    }

    /// Stop the driver. Equivalent to disconnecting and dropping every handle.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Whether the driver is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Receiver that observes every status change.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_watch()
    }

    /// Snapshot of the active subscriptions, sorted.
    pub fn active_topics(&self) -> Vec<Topic> {
        self.shared.active_topics()
    }

    /// Snapshot of the recent-events buffer, newest first.
    pub fn recent_events(&self) -> Vec<RecentEventRecord> {
        self.shared.recent_events()
    }

    /// Most recent surfaced error, cleared on a successful connect.
    pub fn last_error(&self) -> Option<RealtimeError> {
        self.shared.last_error()
    }

    /// Stream of normalized update events.
    ///
    /// Slow receivers lag and skip ahead. Once the driver stops the receiver
    /// reports `Closed`.
    pub fn events(&self) -> broadcast::Receiver<UpdateEvent> {
        self.shared.subscribe_events()
    }
}

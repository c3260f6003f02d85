//! Sync-first realtime client
//!
//! Wraps a [`Session`] whose driver runs on a background worker thread, so
//! callers never need an async runtime of their own.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use phasewatch_stream::{
    ConnectionStatus, RealtimeError, RecentEventRecord, Session, SessionHooks, Topic,
};
use tracing::debug;
use ws_transport::{Connector, WsConnector};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::iter::EventIterator;
use crate::worker::spawn_session_worker;

/// Point-in-time view of the session for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSnapshot {
    /// Connection status
    pub status: ConnectionStatus,
    /// Active subscriptions, sorted
    pub active_topics: Vec<Topic>,
    /// Recent records, newest first
    pub recent_events: Vec<RecentEventRecord>,
    /// Most recent surfaced error
    pub last_error: Option<RealtimeError>,
}

/// Sync-first client for the phasewatch update server
///
/// All methods are blocking or fire-and-forget. Do not call [`connect`]
/// from inside an async runtime; use [`session`](Self::session) there.
///
/// # Example
///
/// ```rust,no_run
/// use phasewatch_realtime::{ClientConfig, RealtimeClient};
///
/// let client = RealtimeClient::new(ClientConfig::new("ws://localhost:3001/realtime"))?;
/// client.connect()?;
/// client.subscribe("tokyo");
///
/// for event in client.iter() {
///     println!("{} records", event.record_count());
/// }
/// # Ok::<(), phasewatch_realtime::ClientError>(())
/// ```
///
/// [`connect`]: Self::connect
pub struct RealtimeClient {
    session: Session,
    event_rx: Arc<Mutex<mpsc::Receiver<phasewatch_stream::UpdateEvent>>>,
    worker: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Create a client that connects over WebSocket, with no hooks.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_hooks(config, SessionHooks::new())
    }

    /// Create a client that connects over WebSocket.
    pub fn with_hooks(config: ClientConfig, hooks: SessionHooks) -> Result<Self> {
        config.validate()?;
        let connector = WsConnector::new(&config.session.url)?;
        Self::with_connector(config, Arc::new(connector), hooks)
    }

    /// Create a client over any connector.
    ///
    /// The worker thread is running when this returns; no connection is
    /// opened until [`connect`](Self::connect).
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        hooks: SessionHooks,
    ) -> Result<Self> {
        let (session, driver) = Session::new(config.session, connector, hooks)?;
        let events = session.events();
        let (event_tx, event_rx) = mpsc::channel();

        let worker = spawn_session_worker(config.worker_thread_name, driver, events, event_tx)?;

        Ok(Self {
            session,
            event_rx: Arc::new(Mutex::new(event_rx)),
            worker: Some(worker),
        })
    }

    /// Connect and block until the first handshake finishes.
    pub fn connect(&self) -> Result<()> {
        match self.session.start_connect().blocking_recv() {
            Ok(outcome) => outcome.map_err(ClientError::from),
            Err(_) => Err(ClientError::WorkerDisconnected),
        }
    }

    /// Block until every request made so far has been handled.
    pub fn flush(&self) -> Result<()> {
        self.session
            .start_flush()
            .blocking_recv()
            .map_err(|_| ClientError::WorkerDisconnected)
    }

    /// Close the connection and forget every subscription.
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Start receiving updates for a location.
    pub fn subscribe(&self, topic: impl Into<Topic>) {
        self.session.subscribe(topic);
    }

    /// Stop receiving updates for a location.
    pub fn unsubscribe(&self, topic: impl Into<Topic>) {
        self.session.unsubscribe(topic);
    }

    /// Ask the server to re-send a time window for a location.
    pub fn request_refresh(&self, topic: impl Into<Topic>, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.session.request_refresh(topic, start, end);
    }

    /// Replace every hook without reconnecting.
    pub fn update_hooks(&self, hooks: SessionHooks) {
        self.session.update_hooks(hooks);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn active_topics(&self) -> Vec<Topic> {
        self.session.active_topics()
    }

    pub fn recent_events(&self) -> Vec<RecentEventRecord> {
        self.session.recent_events()
    }

    pub fn last_error(&self) -> Option<RealtimeError> {
        self.session.last_error()
    }

    /// Everything a dashboard needs to render, read in one call.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            status: self.session.status(),
            active_topics: self.session.active_topics(),
            recent_events: self.session.recent_events(),
            last_error: self.session.last_error(),
        }
    }

    /// Blocking iterator over update events.
    pub fn iter(&self) -> EventIterator {
        EventIterator::new(Arc::clone(&self.event_rx))
    }

    /// The async session handle, for use inside a runtime.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Stop the worker and wait for its thread to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.session.shutdown();
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| ClientError::WorkerDisconnected),
            None => Ok(()),
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        debug!(
            "RealtimeClient dropping, {} active subscriptions",
            self.session.active_topics().len()
        );

        if self.session.is_running() {
            self.session.shutdown();
        }
    }
}

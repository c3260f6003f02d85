//! The session driver task.
//!
//! The driver owns the transport, the reconnect state and the dispatcher,
//! and is the only writer to both the wire and [`SharedState`]. Its loop
//! waits on two things at once: the next command from a handle, and the
//! next event from whatever the link is doing (handshake, inbound frame or
//! backoff timer). Commands win ties.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//!                                  |                 |
//!                                failed           dropped
//!                                  v                 v
//!                                Error <-------------+
//!                                  |
//!                        backoff elapsed -> Connecting
//! ```
//!
//! A server close frame or `disconnect()` leads to `Disconnected` from any
//! state, and nothing reconnects until the next `connect()`.
//!
//! While connected, read silence longer than the heartbeat interval sends a
//! ping. Silence that reaches the idle timeout counts as a dropped link.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};
use ws_transport::{Connector, Inbound, Transport};

use super::{Command, SharedState};
use crate::config::SessionConfig;
use crate::dispatch::Dispatcher;
use crate::error::{RealtimeError, Result};
use crate::protocol::ClientMessage;
use crate::reconnect::{ReconnectDecision, ReconnectState};
use crate::types::{ConnectionStatus, Topic};

type Handshake = BoxFuture<'static, Result<Box<dyn Transport>>>;

/// An established connection and its liveness timer.
struct Connection {
    transport: Box<dyn Transport>,
    heartbeat: Pin<Box<Sleep>>,
    awaiting_pong: bool,
}

impl Connection {
    fn new(transport: Box<dyn Transport>, interval: Duration) -> Self {
        Self {
            transport,
            heartbeat: Box::pin(tokio::time::sleep(interval)),
            awaiting_pong: false,
        }
    }

    /// Something arrived; restart the quiet period.
    fn mark_alive(&mut self, interval: Duration) {
        self.awaiting_pong = false;
        self.heartbeat.as_mut().reset(Instant::now() + interval);
    }
}

/// What the connection is doing right now.
enum Link {
    Idle,
    Connecting(Handshake),
    Connected(Connection),
    Backoff(Pin<Box<Sleep>>),
}

enum LinkEvent {
    Handshake(Result<Box<dyn Transport>>),
    Inbound(ws_transport::Result<Inbound>),
    HeartbeatDue,
    RetryDue,
}

impl Link {
    /// Wait for the next thing to happen on the link. Cancel safe.
    async fn next(&mut self) -> LinkEvent {
        match self {
            Link::Idle => std::future::pending().await,
            Link::Connecting(handshake) => LinkEvent::Handshake(handshake.as_mut().await),
            Link::Connected(conn) => tokio::select! {
                result = conn.transport.recv() => LinkEvent::Inbound(result),
                () = conn.heartbeat.as_mut() => LinkEvent::HeartbeatDue,
            },
            Link::Backoff(sleep) => {
                sleep.as_mut().await;
                LinkEvent::RetryDue
            }
        }
    }
}

enum Step {
    Command(Command),
    Link(LinkEvent),
    Stop,
}

/// Background task behind a [`Session`](super::Session).
///
/// Obtained from [`Session::new`](super::Session::new) and driven by
/// awaiting [`run`](Self::run). Runs until [`Session::shutdown`] is called or
/// every handle is dropped.
///
/// [`Session::shutdown`]: super::Session::shutdown
pub struct SessionDriver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<SharedState>,
    commands: mpsc::UnboundedReceiver<Command>,
    dispatcher: Dispatcher,
    link: Link,
    reconnect: ReconnectState,
    waiters: Vec<oneshot::Sender<Result<()>>>,
}

impl SessionDriver {
    pub(super) fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        shared: Arc<SharedState>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let reconnect = ReconnectState::new(&config.reconnect);
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&shared)),
            config,
            connector,
            shared,
            commands,
            link: Link::Idle,
            reconnect,
            waiters: Vec::new(),
        }
    }

    /// Run the session until shutdown.
    pub async fn run(mut self) {
        debug!(endpoint = %self.connector.endpoint(), "Session driver started");

        loop {
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Stop,
                },
                event = self.link.next() => Step::Link(event),
            };

            match step {
                Step::Command(Command::Shutdown) | Step::Stop => break,
                Step::Command(command) => self.handle_command(command).await,
                Step::Link(LinkEvent::Handshake(result)) => self.handle_handshake(result).await,
                Step::Link(LinkEvent::Inbound(result)) => self.handle_inbound(result).await,
                Step::Link(LinkEvent::HeartbeatDue) => self.handle_heartbeat_due().await,
                Step::Link(LinkEvent::RetryDue) => self.handle_retry_due(),
            }
        }

        self.teardown(RealtimeError::SessionClosed).await;
        self.shared.close_events();
        debug!("Session driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => self.handle_connect(reply),
            Command::Disconnect => {
                info!("Disconnecting");
                self.teardown(RealtimeError::ConnectionFailed {
                    reason: "cancelled by disconnect".to_string(),
                })
                .await;
            }
            Command::Subscribe(topic) => self.handle_subscribe(topic).await,
            Command::Unsubscribe(topic) => {
                if self.shared.remove_topic(&topic) {
                    debug!(topic = %topic, "Unsubscribed");
                    if self.shared.status().is_connected() {
                        self.send(ClientMessage::UnsubscribeLocation(topic)).await;
                    }
                } else {
                    debug!(topic = %topic, "Not subscribed; nothing to remove");
                }
            }
            Command::Refresh(request) => {
                debug!(topic = %request.location, "Requesting data refresh");
                self.send(ClientMessage::RequestDataRefresh(request)).await;
            }
            Command::UpdateHooks(hooks) => {
                debug!(hooks = ?hooks, "Replacing session hooks");
                self.shared.replace_hooks(hooks);
            }
            Command::Flush { reply } => {
                let _ = reply.send(());
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn handle_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        match self.shared.status() {
            ConnectionStatus::Connected => {
                let _ = reply.send(Ok(()));
            }
            ConnectionStatus::Connecting => {
                debug!("Joining in-flight handshake");
                self.waiters.push(reply);
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                // A caller connect() starts a fresh run of attempts and
                // replaces any pending retry timer.
                self.reconnect = ReconnectState::new(&self.config.reconnect);
                self.waiters.push(reply);
                self.start_handshake();
            }
        }
    }

    async fn handle_subscribe(&mut self, topic: Topic) {
        match self.shared.status() {
            ConnectionStatus::Disconnected => {
                let error = RealtimeError::OperationWhileDisconnected {
                    operation: "subscribe",
                };
                warn!(topic = %topic, error = %error, "Subscription rejected");
            }
            // Gave up reconnecting: nothing would ever replay the topic.
            ConnectionStatus::Error if matches!(self.link, Link::Idle) => {
                let error = RealtimeError::OperationWhileDisconnected {
                    operation: "subscribe",
                };
                warn!(topic = %topic, error = %error, "Subscription rejected after giving up");
            }
            ConnectionStatus::Connected => {
                if self.shared.add_topic(topic.clone()) {
                    info!(topic = %topic, "Subscribed");
                    self.send(ClientMessage::SubscribeLocation(topic)).await;
                } else {
                    debug!(topic = %topic, "Already subscribed");
                }
            }
            ConnectionStatus::Connecting | ConnectionStatus::Error => {
                if self.shared.add_topic(topic.clone()) {
                    debug!(topic = %topic, "Subscription recorded until connected");
                }
            }
        }
    }

    async fn handle_handshake(&mut self, result: Result<Box<dyn Transport>>) {
        match result {
            Ok(transport) => {
                self.link = Link::Connected(Connection::new(
                    transport,
                    self.config.heartbeat_interval,
                ));
                self.reconnect = ReconnectState::new(&self.config.reconnect);
                self.shared.clear_last_error();
                self.transition(ConnectionStatus::Connected);
                info!(endpoint = %self.connector.endpoint(), "Connected");

                let topics = self.shared.active_topics();
                for topic in topics {
                    debug!(topic = %topic, "Re-subscribing");
                    self.send(ClientMessage::SubscribeLocation(topic)).await;
                }

                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(error) => {
                warn!(error = %error, "Connection attempt failed");
                self.link = Link::Idle;
                self.transition(ConnectionStatus::Error);
                self.shared.surface(error.clone());
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Err(error.clone()));
                }
                self.schedule_retry();
            }
        }
    }

    async fn handle_inbound(&mut self, result: ws_transport::Result<Inbound>) {
        if result.is_ok() {
            if let Link::Connected(conn) = &mut self.link {
                conn.mark_alive(self.config.heartbeat_interval);
            }
        }

        match result {
            Ok(Inbound::Text(text)) => self.dispatcher.handle_text(&text),
            Ok(Inbound::Pong) => debug!("Heartbeat acknowledged"),
            Ok(Inbound::Closed(reason)) => {
                info!(reason = %reason, "Server closed the connection");
                if let Link::Connected(mut conn) = std::mem::replace(&mut self.link, Link::Idle) {
                    conn.transport.close().await;
                }
                self.transition(ConnectionStatus::Disconnected);
            }
            Err(e) => self.connection_lost(e.to_string()),
        }
    }

    async fn handle_heartbeat_due(&mut self) {
        let interval = self.config.heartbeat_interval;
        let idle_timeout = self.config.idle_timeout;
        let Link::Connected(conn) = &mut self.link else {
            return;
        };

        if conn.awaiting_pong {
            warn!(idle_ms = millis(idle_timeout), "No traffic from server");
            // Dropped without a close handshake; the peer is not answering.
            self.connection_lost(format!("no traffic for {idle_timeout:?}"));
            return;
        }

        debug!("Link quiet; sending heartbeat ping");
        if let Err(e) = conn.transport.ping().await {
            // The read side reports the broken connection.
            warn!(error = %e, "Failed to send heartbeat ping");
        }
        conn.awaiting_pong = true;
        conn.heartbeat
            .as_mut()
            .reset(Instant::now() + idle_timeout.saturating_sub(interval));
    }

    /// Non-deliberate drop: surface it and hand over to the reconnect policy.
    fn connection_lost(&mut self, reason: String) {
        warn!(reason = %reason, "Connection lost");
        self.link = Link::Idle;
        self.transition(ConnectionStatus::Error);
        self.shared.surface(RealtimeError::Transport { reason });
        self.schedule_retry();
    }

    fn handle_retry_due(&mut self) {
        debug!(attempt = self.reconnect.attempt, "Retrying connection");
        self.start_handshake();
    }

    fn schedule_retry(&mut self) {
        let policy = self.config.reconnect;
        match policy.decide(&self.reconnect) {
            ReconnectDecision::Retry { delay } => {
                self.reconnect.advance(&policy);
                warn!(
                    attempt = self.reconnect.attempt,
                    delay_ms = millis(delay),
                    "Scheduling reconnect"
                );
                self.link = Link::Backoff(Box::pin(tokio::time::sleep(delay)));
            }
            ReconnectDecision::GiveUp => {
                info!(attempts = self.reconnect.attempt, "Giving up on reconnecting");
                self.link = Link::Idle;
                self.shared
                    .surface(RealtimeError::MaxReconnectAttemptsExceeded {
                        attempts: self.reconnect.attempt,
                    });
            }
        }
    }

    fn start_handshake(&mut self) {
        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout;
        debug!(endpoint = %connector.endpoint(), "Starting handshake");

        self.link = Link::Connecting(Box::pin(async move {
            match tokio::time::timeout(timeout, connector.connect()).await {
                Ok(Ok(transport)) => Ok(transport),
                Ok(Err(e)) => Err(RealtimeError::ConnectionFailed {
                    reason: e.to_string(),
                }),
                Err(_) => Err(RealtimeError::ConnectionFailed {
                    reason: format!("handshake timed out after {timeout:?}"),
                }),
            }
        }));
        self.transition(ConnectionStatus::Connecting);
    }

    /// Close everything down and forget the active set.
    ///
    /// Pending `connect()` callers receive `cancelled`; it is not surfaced.
    async fn teardown(&mut self, cancelled: RealtimeError) {
        let topics = self.shared.clear_topics();

        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Connected(Connection { mut transport, .. }) => {
                for topic in topics {
                    let frame = ClientMessage::UnsubscribeLocation(topic).to_frame();
                    if let Ok(frame) = frame {
                        // Best effort; the socket is about to close anyway.
                        let _ = transport.send_text(frame).await;
                    }
                }
                transport.close().await;
            }
            Link::Connecting(_) => debug!("Aborted in-flight handshake"),
            Link::Backoff(_) => debug!("Cancelled pending reconnect"),
            Link::Idle => {}
        }

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(cancelled.clone()));
        }
        self.reconnect = ReconnectState::new(&self.config.reconnect);
        self.transition(ConnectionStatus::Disconnected);
    }

    /// Send a control message if connected, otherwise log and drop it.
    async fn send(&mut self, message: ClientMessage) {
        let Link::Connected(Connection { transport, .. }) = &mut self.link else {
            let error = RealtimeError::OperationWhileDisconnected {
                operation: message.operation(),
            };
            warn!(error = %error, "Dropping control message");
            return;
        };

        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode control message");
                return;
            }
        };

        if let Err(e) = transport.send_text(frame).await {
            // The read side reports the broken connection.
            warn!(error = %e, operation = message.operation(), "Failed to send control message");
        }
    }

    fn transition(&self, next: ConnectionStatus) {
        let current = self.shared.status();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Ignoring illegal status transition");
            return;
        }
        debug!(from = %current, to = %next, "Status changed");
        self.shared.set_status(next);
        self.shared.hooks().emit_status(next);
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

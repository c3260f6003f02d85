//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use phasewatch_stream::{
    CacheCategory, ConnectionStatus, RealtimeError, Session, SessionConfig, SessionHooks, Topic,
};
use ws_transport::testing::MockConnector;

/// Let the driver task run until it has nothing left to do right now.
///
/// Does not advance the paused clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Everything the hooks observed, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    pub statuses: Arc<Mutex<Vec<ConnectionStatus>>>,
    pub errors: Arc<Mutex<Vec<RealtimeError>>>,
    pub invalidations: Arc<Mutex<Vec<CacheCategory>>>,
    pub refreshes: Arc<Mutex<u32>>,
}

impl Recorder {
    pub fn hooks(&self) -> SessionHooks {
        let statuses = Arc::clone(&self.statuses);
        let errors = Arc::clone(&self.errors);
        let invalidations = Arc::clone(&self.invalidations);
        let refreshes = Arc::clone(&self.refreshes);
        SessionHooks::new()
            .on_status(move |s| statuses.lock().unwrap().push(s))
            .on_error(move |e| errors.lock().unwrap().push(e.clone()))
            .invalidate_with(move |c| invalidations.lock().unwrap().push(c))
            .on_refresh_complete(move || *refreshes.lock().unwrap() += 1)
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<RealtimeError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn error_codes(&self) -> Vec<&'static str> {
        self.errors().iter().map(RealtimeError::code).collect()
    }

    pub fn invalidations(&self) -> Vec<CacheCategory> {
        self.invalidations.lock().unwrap().clone()
    }
}

/// A spawned session wired to a scripted connector.
pub struct Harness {
    pub session: Session,
    pub connector: MockConnector,
    pub recorder: Recorder,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(SessionConfig::new("ws://mock/realtime"))
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let connector = MockConnector::new();
        let recorder = Recorder::default();
        let session = Session::spawn(config, Arc::new(connector.clone()), recorder.hooks())
            .expect("valid config");
        Self {
            session,
            connector,
            recorder,
        }
    }

    /// Connect and wait for the handshake to succeed.
    pub async fn connected() -> Self {
        let harness = Self::start();
        harness.session.connect().await.expect("connect");
        harness
    }
}

pub fn subscribe_frame(topic: &str) -> String {
    format!(r#"{{"event":"subscribe-location","data":"{topic}"}}"#)
}

pub fn unsubscribe_frame(topic: &str) -> String {
    format!(r#"{{"event":"unsubscribe-location","data":"{topic}"}}"#)
}

pub fn topics(names: &[&str]) -> Vec<Topic> {
    names.iter().map(|n| Topic::new(*n)).collect()
}

/// True if every adjacent pair, starting from `Disconnected`, is a legal edge.
pub fn is_legal_path(statuses: &[ConnectionStatus]) -> bool {
    let mut current = ConnectionStatus::Disconnected;
    for next in statuses {
        if !current.can_transition_to(*next) {
            return false;
        }
        current = *next;
    }
    true
}

//! State shared between the session driver and its handles.
//!
//! The driver is the only writer. Handles read cloned snapshots. No lock is
//! ever held while a hook runs, so hooks may call back into the handle.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};

use crate::config::SessionConfig;
use crate::error::RealtimeError;
use crate::event::{RecordPayload, UpdateEvent};
use crate::hooks::SessionHooks;
use crate::recent::{RecentEventRecord, RecentEvents};
use crate::subscription::SubscriptionSet;
use crate::types::{ConnectionStatus, Topic};

pub(crate) struct SharedState {
    status: watch::Sender<ConnectionStatus>,
    topics: RwLock<SubscriptionSet>,
    recent: RwLock<RecentEvents>,
    last_error: RwLock<Option<RealtimeError>>,
    hooks: RwLock<Arc<SessionHooks>>,
    events: Mutex<Option<broadcast::Sender<UpdateEvent>>>,
}

impl SharedState {
    pub(crate) fn new(config: &SessionConfig, hooks: SessionHooks) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (events, _) = broadcast::channel(config.event_stream_capacity);
        Self {
            status,
            topics: RwLock::new(SubscriptionSet::new()),
            recent: RwLock::new(RecentEvents::new(config.recent_events_capacity)),
            last_error: RwLock::new(None),
            hooks: RwLock::new(Arc::new(hooks)),
            events: Mutex::new(Some(events)),
        }
    }

    // Status

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    // Topics

    pub(crate) fn active_topics(&self) -> Vec<Topic> {
        self.topics.read().snapshot()
    }

    pub(crate) fn add_topic(&self, topic: Topic) -> bool {
        self.topics.write().insert(topic)
    }

    pub(crate) fn remove_topic(&self, topic: &Topic) -> bool {
        self.topics.write().remove(topic)
    }

    pub(crate) fn clear_topics(&self) -> Vec<Topic> {
        self.topics.write().clear()
    }

    // Recent events

    pub(crate) fn buffer_records(&self, records: Vec<RecordPayload>) {
        let now = chrono::Utc::now();
        let mut recent = self.recent.write();
        for record in records {
            recent.push(record, now);
        }
    }

    pub(crate) fn recent_events(&self) -> Vec<RecentEventRecord> {
        self.recent.read().snapshot()
    }

    // Errors

    pub(crate) fn last_error(&self) -> Option<RealtimeError> {
        self.last_error.read().clone()
    }

    pub(crate) fn clear_last_error(&self) {
        *self.last_error.write() = None;
    }

    /// Record a consumer-visible error and pass it to the error hook.
    pub(crate) fn surface(&self, error: RealtimeError) {
        *self.last_error.write() = Some(error.clone());
        self.hooks().emit_error(&error);
    }

    // Hooks

    pub(crate) fn hooks(&self) -> Arc<SessionHooks> {
        Arc::clone(&*self.hooks.read())
    }

    pub(crate) fn replace_hooks(&self, hooks: SessionHooks) {
        *self.hooks.write() = Arc::new(hooks);
    }

    // Event stream

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<UpdateEvent> {
        match self.events.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                // Driver is gone: hand out a receiver that reports Closed.
                let (_, rx) = broadcast::channel(1);
                rx
            }
        }
    }

    pub(crate) fn publish(&self, event: UpdateEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            // No receivers is fine.
            let _ = tx.send(event);
        }
    }

    pub(crate) fn close_events(&self) {
        self.events.lock().take();
    }
}

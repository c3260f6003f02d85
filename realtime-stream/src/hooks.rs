//! Consumer callbacks attached to a session.
//!
//! Hooks are grouped in one [`SessionHooks`] value. The session holds it as
//! an `Arc` and takes a snapshot at the start of every dispatch cycle, so
//! [`Session::update_hooks`](crate::Session::update_hooks) swaps the whole
//! set at once without touching the connection.
//!
//! # Example
//!
//! ```rust
//! use phasewatch_stream::{CacheCategory, SessionHooks};
//!
//! let hooks = SessionHooks::new()
//!     .on_status(|status| println!("status: {status}"))
//!     .invalidate_with(|category: CacheCategory| println!("stale: {category}"));
//! assert!(hooks.has_any());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::RealtimeError;
use crate::event::UpdateEvent;
use crate::types::{CacheCategory, ConnectionStatus};

/// Receiver of cache invalidation signals.
///
/// Implemented for any `Fn(CacheCategory)` closure.
pub trait InvalidationSink: Send + Sync {
    /// Mark one category of cached data as stale.
    fn invalidate(&self, category: CacheCategory);
}

impl<F> InvalidationSink for F
where
    F: Fn(CacheCategory) + Send + Sync,
{
    fn invalidate(&self, category: CacheCategory) {
        self(category)
    }
}

/// Callback for normalized update events.
pub type OnEventCallback = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Callback for surfaced errors.
pub type OnErrorCallback = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// Callback for status changes.
pub type OnStatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Callback for `data-refresh-complete`.
pub type OnRefreshCompleteCallback = Arc<dyn Fn() + Send + Sync>;

/// The set of callbacks a consumer registers. All are optional.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_event: Option<OnEventCallback>,
    invalidation: Option<Arc<dyn InvalidationSink>>,
    on_error: Option<OnErrorCallback>,
    on_status: Option<OnStatusCallback>,
    on_refresh_complete: Option<OnRefreshCompleteCallback>,
}

impl fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHooks")
            .field("on_event", &self.on_event.is_some())
            .field("invalidation", &self.invalidation.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_status", &self.on_status.is_some())
            .field("on_refresh_complete", &self.on_refresh_complete.is_some())
            .finish()
    }
}

impl SessionHooks {
    /// No callbacks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per update message, after the records are buffered.
    pub fn on_event(mut self, f: impl Fn(&UpdateEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    /// Receives at most one signal per category per dispatch cycle.
    pub fn invalidation(mut self, sink: Arc<dyn InvalidationSink>) -> Self {
        self.invalidation = Some(sink);
        self
    }

    /// Closure form of [`invalidation`](Self::invalidation).
    pub fn invalidate_with(self, f: impl Fn(CacheCategory) + Send + Sync + 'static) -> Self {
        self.invalidation(Arc::new(f))
    }

    /// Called for every surfaced error.
    pub fn on_error(mut self, f: impl Fn(&RealtimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called after every status transition.
    pub fn on_status(mut self, f: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }

    /// Called when the server reports a refresh as delivered.
    pub fn on_refresh_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_refresh_complete = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any callback is registered.
    pub fn has_any(&self) -> bool {
        self.on_event.is_some()
            || self.invalidation.is_some()
            || self.on_error.is_some()
            || self.on_status.is_some()
            || self.on_refresh_complete.is_some()
    }

    pub(crate) fn emit_event(&self, event: &UpdateEvent) {
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }

    pub(crate) fn emit_invalidate(&self, category: CacheCategory) {
        if let Some(sink) = &self.invalidation {
            sink.invalidate(category);
        }
    }

    pub(crate) fn emit_error(&self, error: &RealtimeError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_status(&self, status: ConnectionStatus) {
        if let Some(cb) = &self.on_status {
            cb(status);
        }
    }

    pub(crate) fn emit_refresh_complete(&self) {
        if let Some(cb) = &self.on_refresh_complete {
            cb();
        }
    }
}

//! Blocking iterator over update events
//!
//! Lets sync code consume the session's event stream without async/await.

use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use phasewatch_stream::UpdateEvent;

/// Blocking iterator over normalized update events
///
/// `next()` blocks until an event arrives and returns `None` once the
/// client has shut down. Clones share one queue: each event is seen by
/// exactly one of them.
#[derive(Clone)]
pub struct EventIterator {
    rx: Arc<Mutex<mpsc::Receiver<UpdateEvent>>>,
}

impl EventIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<UpdateEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event is available
    ///
    /// Returns `None` if the client has shut down.
    pub fn recv(&self) -> Option<UpdateEvent> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Take an event if one is waiting
    pub fn try_recv(&self) -> Option<UpdateEvent> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UpdateEvent> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Everything currently queued, without blocking
    pub fn drain(&self) -> Vec<UpdateEvent> {
        match self.rx.lock() {
            Ok(rx) => rx.try_iter().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Block until an event touching `location` arrives or `timeout` passes.
    ///
    /// Events for other locations that arrive in the meantime are discarded.
    pub fn next_for_location(&self, location: &str, timeout: Duration) -> Option<UpdateEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let event = self.recv_timeout(remaining)?;
            if event.records().iter().any(|r| r.location() == location) {
                return Some(event);
            }
        }
    }

    /// Iterator that blocks for at most `timeout` per item
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIterator<'_> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for EventIterator {
    type Item = UpdateEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Blocking iterator with a per-item timeout; ends at the first timeout
pub struct TimeoutIterator<'a> {
    inner: &'a EventIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIterator<'_> {
    type Item = UpdateEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

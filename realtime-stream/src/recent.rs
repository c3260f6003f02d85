//! Bounded buffer of the most recent records, newest first.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::RecordPayload;
use crate::types::RecordKind;

/// One buffered record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEventRecord {
    /// Monotonic id, unique within the session
    pub id: u64,
    /// Dataset the record belongs to
    pub kind: RecordKind,
    /// When the client received it
    pub received_at: DateTime<Utc>,
    /// The normalized record
    pub payload: RecordPayload,
}

/// Fixed-capacity ring of recent records.
///
/// Index 0 is the newest entry. `received_at` never decreases from the back
/// of the buffer to the front, even if the wall clock steps backwards.
#[derive(Debug, Clone)]
pub struct RecentEvents {
    entries: VecDeque<RecentEventRecord>,
    capacity: usize,
    next_id: u64,
}

impl RecentEvents {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Insert a record at the front, evicting the oldest entry when full.
    pub fn push(&mut self, payload: RecordPayload, now: DateTime<Utc>) -> &RecentEventRecord {
        let received_at = match self.entries.front() {
            Some(newest) if newest.received_at > now => newest.received_at,
            _ => now,
        };

        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(RecentEventRecord {
            id,
            kind: payload.kind(),
            received_at,
            payload,
        });
        &self.entries[0]
    }

    /// Copy of the buffer, newest first.
    pub fn snapshot(&self) -> Vec<RecentEventRecord> {
        self.entries.iter().cloned().collect()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been buffered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of records kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

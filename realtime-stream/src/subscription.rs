//! The set of topics the consumer wants updates for.

use std::collections::BTreeSet;

use crate::types::Topic;

/// Active subscriptions, kept in sorted order so re-subscription is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: BTreeSet<Topic>,
}

impl SubscriptionSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic. Returns false if it was already present.
    pub fn insert(&mut self, topic: Topic) -> bool {
        self.topics.insert(topic)
    }

    /// Remove a topic. Returns false if it was not present.
    pub fn remove(&mut self, topic: &Topic) -> bool {
        self.topics.remove(topic)
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Sorted copy of the members.
    pub fn snapshot(&self) -> Vec<Topic> {
        self.topics.iter().cloned().collect()
    }

    /// Remove every topic, returning what was removed.
    pub fn clear(&mut self) -> Vec<Topic> {
        std::mem::take(&mut self.topics).into_iter().collect()
    }
}

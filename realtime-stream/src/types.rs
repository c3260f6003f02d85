//! Core types for the phasewatch-stream crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection status of the real-time session.
///
/// Exactly one value holds at any instant. Legal transitions are given by
/// [`ConnectionStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No connection and none being pursued
    #[default]
    Disconnected,
    /// A handshake is in flight
    Connecting,
    /// Frames are flowing
    Connected,
    /// The last attempt or connection failed
    Error,
}

impl ConnectionStatus {
    /// Whether the session may move from `self` to `next`.
    ///
    /// `Error -> Connecting` is only taken by a retry or an explicit
    /// `connect()`, never on its own.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Error)
                | (Error, Connecting)
                | (Error, Disconnected)
        )
    }

    /// True only in the `Connected` state.
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    /// Lowercase name used in logs and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription key identifying one location's data stream.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Create a new topic from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the topic as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Topic {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Topic {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of downstream cached data that an update can make stale.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheCategory {
    /// Celestial phase series
    PhaseData,
    /// Incident records
    IncidentData,
    /// Derived phase/incident correlation results
    CorrelationAnalysis,
    /// Aggregate statistics
    Statistics,
}

impl CacheCategory {
    /// Every category, in a fixed order.
    pub const ALL: [CacheCategory; 4] = [
        CacheCategory::PhaseData,
        CacheCategory::IncidentData,
        CacheCategory::CorrelationAnalysis,
        CacheCategory::Statistics,
    ];

    /// Kebab-case name, matching the cache keys used by the dashboard.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheCategory::PhaseData => "phase-data",
            CacheCategory::IncidentData => "incident-data",
            CacheCategory::CorrelationAnalysis => "correlation-analysis",
            CacheCategory::Statistics => "statistics",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which dataset a record belongs to.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Celestial phase record
    Phase,
    /// Incident record
    Incident,
}

impl RecordKind {
    /// The cache category a record of this kind invalidates.
    pub fn cache_category(self) -> CacheCategory {
        match self {
            RecordKind::Phase => CacheCategory::PhaseData,
            RecordKind::Incident => CacheCategory::IncidentData,
        }
    }
}

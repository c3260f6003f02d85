//! Configuration types for the phasewatch-stream crate
//!
//! [`SessionConfig`] controls the endpoint, handshake timeout, heartbeat,
//! reconnection policy and buffer sizes of a real-time session.

use std::time::Duration;

use crate::error::ConfigError;
use crate::reconnect::ReconnectPolicy;

/// Configuration for a real-time session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the update server
    /// Default: ws://127.0.0.1:3001/realtime
    pub url: String,

    /// Upper bound on a single handshake
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Read silence after which the client pings the server
    /// Default: 30 seconds
    pub heartbeat_interval: Duration,

    /// Read silence after which the connection is treated as dropped
    /// Default: 60 seconds
    pub idle_timeout: Duration,

    /// Backoff applied after non-deliberate drops
    pub reconnect: ReconnectPolicy,

    /// Number of entries kept in the recent-events buffer
    /// Default: 50
    pub recent_events_capacity: usize,

    /// Capacity of the broadcast event stream
    /// Default: 256
    pub event_stream_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001/realtime".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
            recent_events_capacity: 50,
            event_stream_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Create a default configuration for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long the link may stay quiet before a ping, and before it is
    /// given up as dropped.
    pub fn with_heartbeat(mut self, interval: Duration, idle_timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the reconnection policy.
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the recent-events buffer capacity.
    pub fn with_recent_events_capacity(mut self, capacity: usize) -> Self {
        self.recent_events_capacity = capacity;
        self
    }

    /// Set the broadcast event stream capacity.
    pub fn with_event_stream_capacity(mut self, capacity: usize) -> Self {
        self.event_stream_capacity = capacity;
        self
    }

    /// Check the configuration for values the session cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_interval >= self.idle_timeout {
            return Err(ConfigError::HeartbeatInverted {
                interval: self.heartbeat_interval,
                idle: self.idle_timeout,
            });
        }
        if self.recent_events_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("recent_events_capacity"));
        }
        if self.event_stream_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("event_stream_capacity"));
        }
        if self.reconnect.base_delay > self.reconnect.max_delay {
            return Err(ConfigError::BackoffInverted {
                base: self.reconnect.base_delay,
                max: self.reconnect.max_delay,
            });
        }
        Ok(())
    }
}

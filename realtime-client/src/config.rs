//! Configuration for the realtime client

use phasewatch_stream::{ConfigError, SessionConfig};

/// Configuration for [`RealtimeClient`](crate::RealtimeClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Settings passed through to the session
    pub session: SessionConfig,

    /// Name given to the background worker thread
    /// Default: "phasewatch-realtime"
    pub worker_thread_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            worker_thread_name: "phasewatch-realtime".to_string(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            session: SessionConfig::new(url),
            ..Self::default()
        }
    }

    /// Set the endpoint URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.session = self.session.with_url(url);
        self
    }

    /// Replace the session settings
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the worker thread name
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Validate the session settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()
    }
}

//! # phasewatch-realtime
//!
//! A sync-first client for the phasewatch real-time update server.
//!
//! ## Overview
//!
//! The client keeps a live subscription channel to the dashboard's update
//! server. The async session (connection state machine, reconnection,
//! dispatch) runs on a dedicated worker thread with its own tokio runtime;
//! callers use plain blocking methods and a blocking event iterator.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use phasewatch_realtime::prelude::*;
//!
//! let hooks = SessionHooks::new()
//!     .invalidate_with(|category: CacheCategory| println!("refetch {category}"));
//! let client = RealtimeClient::with_hooks(ClientConfig::default(), hooks)?;
//!
//! client.connect()?;
//! client.subscribe("tokyo");
//!
//! for event in client.iter() {
//!     let snapshot = client.snapshot();
//!     println!("{} records, status {}", event.record_count(), snapshot.status);
//! }
//! # Ok::<(), ClientError>(())
//! ```
//!
//! ## Architecture
//!
//! 1. **Worker thread**: owns a current-thread runtime running the session driver
//! 2. **Commands**: every client method enqueues a command; only `connect`
//!    and `flush` wait for an answer
//! 3. **Snapshots**: status, topics, recent events and the last error are read
//!    from shared state without touching the worker
//! 4. **Events**: forwarded from the session's broadcast stream into a std
//!    channel behind [`EventIterator`]

pub mod client;
pub mod config;
pub mod error;
pub mod iter;
mod worker;

// Re-export main types for convenience
pub use client::{ClientSnapshot, RealtimeClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use iter::{EventIterator, TimeoutIterator};

// Re-export commonly used types from dependencies
pub use phasewatch_stream::{
    CacheCategory, ConfigError, ConnectionStatus, IncidentRecord, InvalidationSink,
    PhaseRecord, RealtimeError, ReconnectPolicy, RecentEventRecord, RecordKind, RecordPayload,
    Session, SessionConfig, SessionHooks, Topic, UpdateEvent,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use phasewatch_realtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CacheCategory, ClientConfig, ClientError, ClientSnapshot, ConnectionStatus,
        EventIterator, RealtimeClient, RealtimeError, Result, SessionConfig, SessionHooks,
        Topic, UpdateEvent,
    };
}

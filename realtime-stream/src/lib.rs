//! # phasewatch-stream
//!
//! Real-time update session for the phasewatch dashboard.
//!
//! A [`Session`] keeps one WebSocket connection to the update server alive,
//! retries with bounded exponential backoff when it drops, and turns the
//! pushed JSON frames into typed [`UpdateEvent`]s. Every record lands in a
//! bounded recent-events buffer, is passed to the consumer's hooks and the
//! event stream, and marks the matching [`CacheCategory`] stale.
//!
//! The transport is injected through [`ws_transport::Connector`], so the
//! same session runs against a real server or a scripted test connector.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phasewatch_stream::{CacheCategory, Session, SessionConfig, SessionHooks};
//! use ws_transport::WsConnector;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::default();
//! let connector = Arc::new(WsConnector::new(&config.url)?);
//! let hooks = SessionHooks::new()
//!     .on_event(|event| println!("{} new records", event.record_count()))
//!     .invalidate_with(|category: CacheCategory| println!("{category} is stale"));
//!
//! let session = Session::spawn(config, connector, hooks)?;
//! session.connect().await?;
//! session.subscribe("tokyo");
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod event;
mod hooks;
mod protocol;
mod recent;
mod reconnect;
mod session;
mod subscription;
mod types;

pub use config::SessionConfig;
pub use error::{ConfigError, RealtimeError, Result};
pub use event::{parse_timestamp, IncidentRecord, PhaseRecord, RecordPayload, UpdateEvent};
pub use hooks::{
    InvalidationSink, OnErrorCallback, OnEventCallback, OnRefreshCompleteCallback,
    OnStatusCallback, SessionHooks,
};
pub use protocol::{decode_frame, ClientMessage, InboundFrame, RefreshRequest, ServerMessage};
pub use recent::{RecentEventRecord, RecentEvents};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use session::{Session, SessionDriver};
pub use subscription::SubscriptionSet;
pub use types::{CacheCategory, ConnectionStatus, RecordKind, Topic};

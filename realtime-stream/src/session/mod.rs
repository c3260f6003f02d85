//! Real-time session: one background driver and any number of handles.
//!
//! The module is split the same way responsibilities are split at runtime:
//!
//! - `handle`: [`Session`], the cloneable consumer-facing API
//! - `driver`: [`SessionDriver`], the task that owns the transport, runs the
//!   state machine and applies the reconnection policy
//! - `shared`: state written by the driver and read by handles
//!
//! Handles talk to the driver over an unbounded command channel, so every
//! handle method except [`Session::connect`] and [`Session::flush`] returns
//! immediately.

mod driver;
mod handle;
mod shared;

pub use driver::SessionDriver;
pub use handle::Session;

pub(crate) use shared::SharedState;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::hooks::SessionHooks;
use crate::protocol::RefreshRequest;
use crate::types::Topic;

/// Requests from handles to the driver.
pub(crate) enum Command {
    Connect { reply: oneshot::Sender<Result<()>> },
    Disconnect,
    Subscribe(Topic),
    Unsubscribe(Topic),
    Refresh(RefreshRequest),
    UpdateHooks(SessionHooks),
    Flush { reply: oneshot::Sender<()> },
    Shutdown,
}

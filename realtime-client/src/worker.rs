//! Background worker thread for the session driver
//!
//! Spawns a named thread with its own single-threaded tokio runtime. The
//! thread runs the session driver and forwards the session's event stream
//! into a std channel the sync iterator reads from.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use phasewatch_stream::{SessionDriver, UpdateEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};

/// Spawn the worker thread and wait until its runtime is up.
///
/// # Errors
///
/// Returns [`ClientError::WorkerStartup`] if the thread or its runtime cannot
/// be created.
pub(crate) fn spawn_session_worker(
    name: String,
    driver: SessionDriver,
    events: broadcast::Receiver<UpdateEvent>,
    event_tx: mpsc::Sender<UpdateEvent>,
) -> Result<JoinHandle<()>> {
    let (ready_tx, ready_rx) = mpsc::sync_channel::<std::result::Result<(), String>>(1);

    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime for realtime worker: {}", e);
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            rt.block_on(async move {
                let forwarder = tokio::spawn(forward_events(events, event_tx));
                driver.run().await;
                // The event stream closes when the driver stops.
                let _ = forwarder.await;
            });
            debug!("Realtime worker exiting");
        })
        .map_err(|e| ClientError::WorkerStartup(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(reason)) => Err(ClientError::WorkerStartup(reason)),
        Err(_) => Err(ClientError::WorkerStartup(
            "worker exited during startup".to_string(),
        )),
    }
}

/// Copy events from the session stream into the sync channel.
async fn forward_events(
    mut events: broadcast::Receiver<UpdateEvent>,
    event_tx: mpsc::Sender<UpdateEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("Event iterator dropped; stopping forwarder");
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event forwarder lagged; skipping ahead");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use phasewatch_stream::{PhaseRecord, RecordPayload};

    fn event(location: &str) -> UpdateEvent {
        UpdateEvent::Single(RecordPayload::Phase(PhaseRecord {
            location: location.to_string(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 3, 25, 0, 0, 0).unwrap(),
            phase: "new_moon".to_string(),
            illumination: None,
        }))
    }

    #[tokio::test]
    async fn test_forwarder_copies_until_closed() {
        let (tx, rx) = broadcast::channel(8);
        let (event_tx, event_rx) = mpsc::channel();
        let forwarder = tokio::spawn(forward_events(rx, event_tx));

        tx.send(event("a")).unwrap();
        tx.send(event("b")).unwrap();
        drop(tx);
        forwarder.await.unwrap();

        let forwarded: Vec<_> = event_rx.try_iter().collect();
        assert_eq!(forwarded, vec![event("a"), event("b")]);
    }

    #[tokio::test]
    async fn test_forwarder_skips_ahead_when_lagged() {
        let (tx, rx) = broadcast::channel(2);
        let (event_tx, event_rx) = mpsc::channel();

        for name in ["a", "b", "c", "d"] {
            tx.send(event(name)).unwrap();
        }
        drop(tx);
        forward_events(rx, event_tx).await;

        let forwarded: Vec<_> = event_rx.try_iter().collect();
        assert_eq!(forwarded, vec![event("c"), event("d")]);
    }
}

//! Routing of inbound frames to buffers, hooks and invalidation signals.
//!
//! One call to [`Dispatcher::handle_text`] is one dispatch cycle. A cycle
//! takes a single hooks snapshot, so a concurrent hook swap is seen either
//! entirely or not at all.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RealtimeError;
use crate::event::UpdateEvent;
use crate::hooks::SessionHooks;
use crate::protocol::{decode_frame, InboundFrame, ServerMessage};
use crate::session::SharedState;
use crate::types::CacheCategory;

pub(crate) struct Dispatcher {
    shared: Arc<SharedState>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Decode one text frame and route it. Bad frames are logged and dropped.
    pub(crate) fn handle_text(&self, text: &str) {
        match decode_frame(text) {
            Ok(InboundFrame::Message(message)) => self.handle_message(message),
            Ok(InboundFrame::Unrecognized(event)) => {
                warn!(event = %event, "Dropping frame with unknown event");
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
            }
        }
    }

    fn handle_message(&self, message: ServerMessage) {
        let hooks = self.shared.hooks();

        match message {
            ServerMessage::Update(event) => self.handle_update(&hooks, event),
            ServerMessage::ConnectionStatus(status) => {
                debug!(status = %status, "Server reported connection status");
            }
            ServerMessage::DataRefreshComplete => {
                info!("Data refresh complete");
                for category in CacheCategory::ALL {
                    hooks.emit_invalidate(category);
                }
                hooks.emit_refresh_complete();
            }
            ServerMessage::Error { message, code } => {
                warn!(message = %message, code = ?code, "Server reported an error");
                self.shared
                    .surface(RealtimeError::ServerError { message, code });
            }
        }
    }

    fn handle_update(&self, hooks: &SessionHooks, event: UpdateEvent) {
        let count = event.record_count();
        if count == 0 {
            debug!("Ignoring empty bulk update");
            return;
        }
        debug!(records = count, "Dispatching update");

        self.shared.buffer_records(event.records());
        hooks.emit_event(&event);
        let stale = event.stale_categories();
        self.shared.publish(event);

        for category in stale {
            hooks.emit_invalidate(category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::event::RecordPayload;
    use crate::hooks::InvalidationSink;
    use crate::types::RecordKind;
    use mockall::mock;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Mutex;

    mock! {
        Sink {}
        impl InvalidationSink for Sink {
            fn invalidate(&self, category: CacheCategory);
        }
    }

    fn dispatcher_with(hooks: SessionHooks) -> (Dispatcher, Arc<SharedState>) {
        let shared = Arc::new(SharedState::new(&SessionConfig::default(), hooks));
        (Dispatcher::new(Arc::clone(&shared)), shared)
    }

    fn phase(location: &str, ts: &str) -> serde_json::Value {
        json!({"location": location, "timestamp": ts, "phase": "full_moon"})
    }

    fn incident(id: &str) -> serde_json::Value {
        json!({"id": id, "location": "tokyo", "timestamp": "2024-03-25T22:00:00Z", "category": "noise"})
    }

    #[test]
    fn test_bulk_update_buffers_each_record_and_coalesces_invalidations() {
        let mut sink = MockSink::new();
        sink.expect_invalidate()
            .with(eq(CacheCategory::PhaseData))
            .times(1)
            .return_const(());
        sink.expect_invalidate()
            .with(eq(CacheCategory::IncidentData))
            .times(1)
            .return_const(());

        let (dispatcher, shared) =
            dispatcher_with(SessionHooks::new().invalidation(Arc::new(sink)));

        let frame = json!({
            "event": "bulk-data-update",
            "data": {
                "phaseUpdates": [
                    phase("a", "2024-03-01T00:00:00Z"),
                    phase("b", "2024-03-02T00:00:00Z"),
                    phase("c", "2024-03-03T00:00:00Z")
                ],
                "incidentUpdates": [incident("1"), incident("2")]
            }
        });
        dispatcher.handle_text(&frame.to_string());

        let recent = shared.recent_events();
        assert_eq!(recent.len(), 5);
        // Newest first: the last incident was inserted last.
        assert_eq!(recent[0].kind, RecordKind::Incident);
        assert_eq!(recent[4].payload.location(), "a");
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn test_single_update_reaches_hook_and_stream() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let (dispatcher, shared) = dispatcher_with(
            SessionHooks::new().on_event(move |event| hook_seen.lock().unwrap().push(event.clone())),
        );
        let mut stream = shared.subscribe_events();

        let frame = json!({
            "event": "data-update",
            "data": {"type": "phase", "payload": phase("oslo", "2024-03-25")}
        });
        dispatcher.handle_text(&frame.to_string());

        let events = seen.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        match &events[0] {
            UpdateEvent::Single(RecordPayload::Phase(record)) => {
                assert_eq!(record.location, "oslo")
            }
            other => panic!("Expected phase update, got {other:?}"),
        }
        assert_eq!(stream.try_recv().unwrap(), events[0]);
    }

    #[test]
    fn test_malformed_bulk_is_dropped_whole() {
        let mut sink = MockSink::new();
        sink.expect_invalidate().times(0);
        let (dispatcher, shared) =
            dispatcher_with(SessionHooks::new().invalidation(Arc::new(sink)));

        let frame = json!({
            "event": "bulk-data-update",
            "data": {"phaseUpdates": [phase("a", "2024-03-01"), {"location": "b"}]}
        });
        dispatcher.handle_text(&frame.to_string());
        dispatcher.handle_text("{not json");
        dispatcher.handle_text(r#"{"event":"presence","data":{}}"#);

        assert!(shared.recent_events().is_empty());
        assert!(shared.last_error().is_none());
    }

    #[test]
    fn test_empty_bulk_produces_nothing() {
        let mut sink = MockSink::new();
        sink.expect_invalidate().times(0);
        let (dispatcher, shared) =
            dispatcher_with(SessionHooks::new().invalidation(Arc::new(sink)));

        dispatcher.handle_text(r#"{"event":"bulk-data-update","data":{}}"#);
        assert!(shared.recent_events().is_empty());
    }

    #[test]
    fn test_refresh_complete_invalidates_everything() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let refreshed = Arc::new(Mutex::new(0));
        let refresh_count = Arc::clone(&refreshed);
        let (dispatcher, _shared) = dispatcher_with(
            SessionHooks::new()
                .invalidate_with(move |c| sink_seen.lock().unwrap().push(c))
                .on_refresh_complete(move || *refresh_count.lock().unwrap() += 1),
        );

        dispatcher.handle_text(r#"{"event":"data-refresh-complete"}"#);
        assert_eq!(*seen.lock().unwrap(), CacheCategory::ALL.to_vec());
        assert_eq!(*refreshed.lock().unwrap(), 1);
    }

    #[test]
    fn test_server_error_is_surfaced() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let hook_errors = Arc::clone(&errors);
        let (dispatcher, shared) = dispatcher_with(
            SessionHooks::new().on_error(move |e| hook_errors.lock().unwrap().push(e.clone())),
        );

        dispatcher.handle_text(r#"{"event":"error","data":{"message":"quota","code":"Q1"}}"#);

        let expected = RealtimeError::ServerError {
            message: "quota".to_string(),
            code: Some("Q1".to_string()),
        };
        assert_eq!(shared.last_error(), Some(expected.clone()));
        assert_eq!(*errors.lock().unwrap(), vec![expected]);
    }

    #[test]
    fn test_connection_status_frame_is_informational() {
        let (dispatcher, shared) = dispatcher_with(SessionHooks::new());
        dispatcher.handle_text(r#"{"event":"connection-status","data":"error"}"#);
        assert_eq!(
            shared.status(),
            crate::types::ConnectionStatus::Disconnected
        );
        assert!(shared.last_error().is_none());
    }
}

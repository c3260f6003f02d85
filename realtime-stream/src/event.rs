//! Normalized update events.
//!
//! Everything in this module has already passed validation: timestamps are
//! `DateTime<Utc>`, required fields are present. Wire shapes live in
//! [`crate::protocol`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{RealtimeError, Result};
use crate::types::{CacheCategory, RecordKind};

/// One celestial phase observation for a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    /// Location the record belongs to
    pub location: String,
    /// When the phase applies
    pub timestamp: DateTime<Utc>,
    /// Phase name, e.g. `full_moon`
    pub phase: String,
    /// Illuminated fraction in `0.0..=1.0`, if reported
    pub illumination: Option<f64>,
}

/// One incident record for a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Server-assigned incident identifier
    pub id: String,
    /// Location the incident occurred at
    pub location: String,
    /// When the incident occurred
    pub timestamp: DateTime<Utc>,
    /// Incident category
    pub category: String,
    /// Severity label, if reported
    pub severity: Option<String>,
    /// Free-form description, if reported
    pub description: Option<String>,
}

/// A single normalized record of either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum RecordPayload {
    /// Phase record
    Phase(PhaseRecord),
    /// Incident record
    Incident(IncidentRecord),
}

impl RecordPayload {
    /// Which dataset the record belongs to.
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Phase(_) => RecordKind::Phase,
            RecordPayload::Incident(_) => RecordKind::Incident,
        }
    }

    /// Location the record belongs to.
    pub fn location(&self) -> &str {
        match self {
            RecordPayload::Phase(p) => &p.location,
            RecordPayload::Incident(i) => &i.location,
        }
    }

    /// The record's own timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RecordPayload::Phase(p) => p.timestamp,
            RecordPayload::Incident(i) => i.timestamp,
        }
    }
}

/// A normalized push notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UpdateEvent {
    /// One record
    Single(RecordPayload),
    /// A batch of records processed in one dispatch cycle
    Bulk {
        /// Phase records in wire order
        phase_updates: Vec<PhaseRecord>,
        /// Incident records in wire order
        incident_updates: Vec<IncidentRecord>,
    },
}

impl UpdateEvent {
    /// Every record carried by the event, phase records first for bulk updates.
    pub fn records(&self) -> Vec<RecordPayload> {
        match self {
            UpdateEvent::Single(record) => vec![record.clone()],
            UpdateEvent::Bulk {
                phase_updates,
                incident_updates,
            } => phase_updates
                .iter()
                .cloned()
                .map(RecordPayload::Phase)
                .chain(incident_updates.iter().cloned().map(RecordPayload::Incident))
                .collect(),
        }
    }

    /// Number of records carried.
    pub fn record_count(&self) -> usize {
        match self {
            UpdateEvent::Single(_) => 1,
            UpdateEvent::Bulk {
                phase_updates,
                incident_updates,
            } => phase_updates.len() + incident_updates.len(),
        }
    }

    /// Cache categories made stale by this event, one entry per category.
    pub fn stale_categories(&self) -> Vec<CacheCategory> {
        match self {
            UpdateEvent::Single(record) => vec![record.kind().cache_category()],
            UpdateEvent::Bulk {
                phase_updates,
                incident_updates,
            } => {
                let mut categories = Vec::with_capacity(2);
                if !phase_updates.is_empty() {
                    categories.push(CacheCategory::PhaseData);
                }
                if !incident_updates.is_empty() {
                    categories.push(CacheCategory::IncidentData);
                }
                categories
            }
        }
    }
}

/// Naive layouts accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Convert a wire timestamp into `DateTime<Utc>`.
///
/// Accepts RFC 3339 with any offset, naive date-times (treated as UTC) and
/// bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(naive.and_utc());
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(RealtimeError::malformed(format!(
        "unrecognized timestamp '{raw}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use rstest::rstest;

    fn phase(location: &str) -> PhaseRecord {
        PhaseRecord {
            location: location.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 25, 7, 0, 0).unwrap(),
            phase: "full_moon".to_string(),
            illumination: Some(1.0),
        }
    }

    fn incident(id: &str) -> IncidentRecord {
        IncidentRecord {
            id: id.to_string(),
            location: "tokyo".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 25, 22, 15, 0).unwrap(),
            category: "noise".to_string(),
            severity: None,
            description: None,
        }
    }

    #[rstest]
    #[case("2024-03-25T07:00:00Z", (2024, 3, 25, 7, 0, 0))]
    #[case("2024-03-25T09:00:00+02:00", (2024, 3, 25, 7, 0, 0))]
    #[case("2024-03-25T07:00:00.125Z", (2024, 3, 25, 7, 0, 0))]
    #[case("2024-03-25T07:00:00", (2024, 3, 25, 7, 0, 0))]
    #[case("2024-03-25 07:00:00", (2024, 3, 25, 7, 0, 0))]
    #[case(" 2024-03-25 ", (2024, 3, 25, 0, 0, 0))]
    fn test_parse_timestamp_accepts(
        #[case] raw: &str,
        #[case] expected: (i32, u32, u32, u32, u32, u32),
    ) {
        let (y, mo, d, h, mi, s) = expected;
        let parsed = parse_timestamp(raw).unwrap();
        let whole_seconds = parsed.with_nanosecond(0).unwrap();
        assert_eq!(whole_seconds, Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-40")]
    #[case("1711350000")]
    fn test_parse_timestamp_rejects(#[case] raw: &str) {
        let err = parse_timestamp(raw).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn test_fractional_seconds_preserved() {
        let parsed = parse_timestamp("2024-03-25T07:00:00.125Z").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 125);
    }

    #[test]
    fn test_single_event_accessors() {
        let event = UpdateEvent::Single(RecordPayload::Phase(phase("oslo")));
        assert_eq!(event.record_count(), 1);
        assert_eq!(event.stale_categories(), vec![CacheCategory::PhaseData]);
        let records = event.records();
        assert_eq!(records[0].kind(), RecordKind::Phase);
        assert_eq!(records[0].location(), "oslo");
    }

    #[test]
    fn test_bulk_event_coalesces_categories() {
        let event = UpdateEvent::Bulk {
            phase_updates: vec![phase("a"), phase("b"), phase("c")],
            incident_updates: vec![incident("1"), incident("2")],
        };
        assert_eq!(event.record_count(), 5);
        assert_eq!(event.records().len(), 5);
        assert_eq!(
            event.stale_categories(),
            vec![CacheCategory::PhaseData, CacheCategory::IncidentData]
        );

        let incidents_only = UpdateEvent::Bulk {
            phase_updates: vec![],
            incident_updates: vec![incident("1")],
        };
        assert_eq!(
            incidents_only.stale_categories(),
            vec![CacheCategory::IncidentData]
        );

        let empty = UpdateEvent::Bulk {
            phase_updates: vec![],
            incident_updates: vec![],
        };
        assert!(empty.stale_categories().is_empty());
        assert_eq!(empty.record_count(), 0);
    }

    #[test]
    fn test_record_payload_serializes_with_type_tag() {
        let json = serde_json::to_value(RecordPayload::Incident(incident("42"))).unwrap();
        assert_eq!(json["type"], "incident");
        assert_eq!(json["payload"]["id"], "42");
        assert_eq!(json["payload"]["timestamp"], "2024-03-25T22:15:00Z");
    }
}

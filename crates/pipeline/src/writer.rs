//! Record writer: snapshot publishing and log append.
//!
//! The two effects are best-effort and independent. A failed copy never
//! blocks the append, and a failed append never undoes the copy.

use crate::filter::QualifiedEvent;
use chrono::{DateTime, FixedOffset};
use frigate_event_log::{EventLogError, EventLogStore};
use frigate_event_spec::{DecodeError, EventRecord};
use frigate_snapshots::{PublishedSnapshot, SnapshotError, SnapshotPublisher};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record error: {0}")]
    Decode(#[from] DecodeError),
    #[error("event log error: {0}")]
    Log(#[from] EventLogError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedRecord {
    pub record: EventRecord,
    /// Entries in the log after the append.
    pub entries: usize,
}

/// Per-effect results of one qualifying event.
#[derive(Debug)]
pub struct WriteReport {
    pub event_id: String,
    pub snapshot: Result<PublishedSnapshot, SnapshotError>,
    pub record: Result<AppendedRecord, RecordError>,
}

pub struct RecordWriter {
    log: EventLogStore,
    snapshots: SnapshotPublisher,
}

impl RecordWriter {
    pub fn new(log: EventLogStore, snapshots: SnapshotPublisher) -> Self {
        Self { log, snapshots }
    }

    pub fn write(&self, event: &QualifiedEvent, now: DateTime<FixedOffset>) -> WriteReport {
        WriteReport {
            event_id: event.event_id.clone(),
            snapshot: self.publish_snapshot(&event.event_id),
            record: self.append_record(event, now),
        }
    }

    fn publish_snapshot(&self, event_id: &str) -> Result<PublishedSnapshot, SnapshotError> {
        match self.snapshots.publish(event_id) {
            Ok(snap) => {
                info!(
                    "copied {} to {} ({} bytes, {})",
                    snap.source.display(),
                    snap.destination.display(),
                    snap.bytes,
                    snap.sha256
                );
                Ok(snap)
            }
            Err(e) => {
                error!("failed to publish snapshot for eventId={event_id}: {e}");
                Err(e)
            }
        }
    }

    fn append_record(
        &self,
        event: &QualifiedEvent,
        now: DateTime<FixedOffset>,
    ) -> Result<AppendedRecord, RecordError> {
        match self.try_append(event, now) {
            Ok(appended) => {
                info!(
                    "event eventId={} written to {} ({} entries)",
                    appended.record.event_id,
                    self.log.path().display(),
                    appended.entries
                );
                Ok(appended)
            }
            Err(e) => {
                error!("event eventId={} not written: {e}", event.event_id);
                Err(e)
            }
        }
    }

    fn try_append(
        &self,
        event: &QualifiedEvent,
        now: DateTime<FixedOffset>,
    ) -> Result<AppendedRecord, RecordError> {
        let zones = event.zones.as_deref().ok_or(DecodeError::Missing("zones"))?;
        let label = event.label.as_deref().ok_or(DecodeError::Missing("label"))?;
        let record = EventRecord::from_attributes(
            now,
            event.event_id.clone(),
            zones,
            label,
            event.severity.clone(),
        )?;
        let entries = self.log.append(&record)?;
        Ok(AppendedRecord { record, entries })
    }
}

//! frigate_event_log
//!
//! Append-only JSON-array log of alert events.
//! - The whole array is read, extended by one record, and rewritten
//! - Rewrites go through a temp file + rename, so the file on disk is always
//!   either the previous array or the new one
//! - A missing or unparseable log is replaced by a fresh array on the next append
//! - Existing entries are carried over as raw JSON, never re-validated
//!
//! NOTE: read-modify-write with no lock. Two overlapping appends to the same
//! file can lose one record (last writer wins).

use frigate_common::write_atomic;
use frigate_event_spec::EventRecord;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write error: {0}")]
    Write(#[from] frigate_common::CommonError),
    #[error("log is not a JSON array")]
    NotAnArray,
    #[error("entry {index} is not a valid event record: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Where the in-memory log came from on a tolerant load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOrigin {
    Existing,
    Absent,
    /// File existed but could not be read or parsed; its content is discarded.
    Reset(String),
}

#[derive(Debug, Clone)]
pub struct LoadedLog {
    pub entries: Vec<Value>,
    pub origin: LogOrigin,
}

pub struct EventLogStore {
    path: PathBuf,
}

impl EventLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config-root>/html/data/frigate-events.json`
    pub fn in_config_root(config_root: impl AsRef<Path>) -> Self {
        Self::new(
            config_root
                .as_ref()
                .join("html")
                .join("data")
                .join("frigate-events.json"),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read: the file must exist and hold a JSON array.
    pub fn read(&self) -> Result<Vec<Value>, EventLogError> {
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Array(entries) => Ok(entries),
            _ => Err(EventLogError::NotAnArray),
        }
    }

    /// Strict read where every entry must also be a well-formed record.
    pub fn records(&self) -> Result<Vec<EventRecord>, EventLogError> {
        self.read()?
            .into_iter()
            .enumerate()
            .map(|(index, v)| {
                serde_json::from_value(v)
                    .map_err(|source| EventLogError::InvalidRecord { index, source })
            })
            .collect()
    }

    /// Tolerant read used on the write path. Never fails.
    pub fn load_or_empty(&self) -> LoadedLog {
        match self.read() {
            Ok(entries) => LoadedLog { entries, origin: LogOrigin::Existing },
            Err(EventLogError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("no event log at {}, starting a new one", self.path.display());
                LoadedLog { entries: Vec::new(), origin: LogOrigin::Absent }
            }
            Err(e) => {
                warn!(
                    "event log {} unreadable ({e}), starting a new one",
                    self.path.display()
                );
                LoadedLog { entries: Vec::new(), origin: LogOrigin::Reset(e.to_string()) }
            }
        }
    }

    /// Replace the whole log with `entries` (pretty-printed, 2-space indent).
    pub fn persist(&self, entries: &[Value]) -> Result<(), EventLogError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Append one record and return the new number of entries.
    pub fn append(&self, record: &EventRecord) -> Result<usize, EventLogError> {
        let mut log = self.load_or_empty();
        log.entries.push(serde_json::to_value(record)?);
        self.persist(&log.entries)?;
        Ok(log.entries.len())
    }
}

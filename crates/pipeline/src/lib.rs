//! frigate_pipeline
//!
//! Event-end handling for one camera stream:
//!   attributes -> filter -> (snapshot copy, log append)
//!
//! `Pipeline::handle` never returns an error. Every failure is logged where
//! it happens and surfaced only through the returned `Outcome`.

pub mod filter;
pub mod writer;

pub use filter::{evaluate, Decision, QualifiedEvent, SkipReason};
pub use writer::{AppendedRecord, RecordError, RecordWriter, WriteReport};

use chrono::{DateTime, FixedOffset, Local};
use frigate_event_log::EventLogStore;
use frigate_event_spec::{AttributeStore, EventAttributes, ItemNames};
use frigate_snapshots::SnapshotPublisher;
use std::path::PathBuf;

pub const DEFAULT_CLIPS_DIR: &str = "/srv/camera/frigate/clips";
pub const DEFAULT_STREAM: &str = "driveway";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Host config root; the log and published images live under `<root>/html`.
    pub config_root: PathBuf,
    pub clips_dir: PathBuf,
    pub stream: String,
    pub items: ItemNames,
}

impl PipelineConfig {
    pub fn new(
        config_root: impl Into<PathBuf>,
        clips_dir: impl Into<PathBuf>,
        stream: impl Into<String>,
    ) -> Self {
        let stream = stream.into();
        Self {
            config_root: config_root.into(),
            clips_dir: clips_dir.into(),
            items: ItemNames::for_stream(&stream),
            stream,
        }
    }

    pub fn with_items(mut self, items: ItemNames) -> Self {
        self.items = items;
        self
    }
}

#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    Written(WriteReport),
}

pub struct Pipeline {
    items: ItemNames,
    writer: RecordWriter,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let log = EventLogStore::in_config_root(&config.config_root);
        let snapshots = SnapshotPublisher::in_config_root(
            config.clips_dir.clone(),
            &config.config_root,
            config.stream.clone(),
        );
        Self {
            items: config.items.clone(),
            writer: RecordWriter::new(log, snapshots),
        }
    }

    pub fn handle(&self, store: &dyn AttributeStore) -> Outcome {
        self.handle_at(store, Local::now().fixed_offset())
    }

    /// Same as `handle`, with the record timestamp supplied by the caller.
    pub fn handle_at(&self, store: &dyn AttributeStore, now: DateTime<FixedOffset>) -> Outcome {
        let attrs = EventAttributes::read(store, &self.items);
        match evaluate(&attrs) {
            Decision::Skip(reason) => Outcome::Skipped(reason),
            Decision::Persist(event) => Outcome::Written(self.writer.write(&event, now)),
        }
    }
}

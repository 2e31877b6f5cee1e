//! Snapshot publishing.
//!
//! Layout:
//!   <clips-dir>/<stream>-<event_id>.jpg          (written by the detector)
//!   <config-root>/html/camera/<event_id>.jpg     (served to the dashboard)
//!
//! Publishing is a plain byte copy that replaces any earlier copy.

use frigate_common::sha256_file;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("event id {0:?} cannot be used as a file name")]
    InvalidEventId(String),
    #[error("failed to copy {} to {}: {error}", source_path.display(), dest_path.display())]
    Copy {
        source_path: PathBuf,
        dest_path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("digest error: {0}")]
    Digest(#[from] frigate_common::CommonError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
    /// sha256:... of the published file
    pub sha256: String,
}

pub struct SnapshotPublisher {
    clips_dir: PathBuf,
    publish_dir: PathBuf,
    stream: String,
}

impl SnapshotPublisher {
    pub fn new(
        clips_dir: impl Into<PathBuf>,
        publish_dir: impl Into<PathBuf>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            clips_dir: clips_dir.into(),
            publish_dir: publish_dir.into(),
            stream: stream.into(),
        }
    }

    /// Publish into `<config-root>/html/camera`.
    pub fn in_config_root(
        clips_dir: impl Into<PathBuf>,
        config_root: impl AsRef<Path>,
        stream: impl Into<String>,
    ) -> Self {
        Self::new(
            clips_dir,
            config_root.as_ref().join("html").join("camera"),
            stream,
        )
    }

    pub fn publish_dir(&self) -> &Path {
        &self.publish_dir
    }

    pub fn source_path(&self, event_id: &str) -> Result<PathBuf, SnapshotError> {
        check_event_id(event_id)?;
        Ok(self
            .clips_dir
            .join(format!("{}-{}.jpg", self.stream, event_id)))
    }

    pub fn published_path(&self, event_id: &str) -> Result<PathBuf, SnapshotError> {
        check_event_id(event_id)?;
        Ok(self.publish_dir.join(format!("{event_id}.jpg")))
    }

    pub fn is_published(&self, event_id: &str) -> bool {
        self.published_path(event_id)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// The detector's clip snapshot for this event is still on disk.
    pub fn has_source(&self, event_id: &str) -> bool {
        self.source_path(event_id)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Copy the event's clip snapshot into the publish dir, replacing any existing file.
    pub fn publish(&self, event_id: &str) -> Result<PublishedSnapshot, SnapshotError> {
        let source = self.source_path(event_id)?;
        let destination = self.published_path(event_id)?;

        fs::create_dir_all(&self.publish_dir)?;
        let bytes = fs::copy(&source, &destination).map_err(|error| SnapshotError::Copy {
            source_path: source.clone(),
            dest_path: destination.clone(),
            error,
        })?;
        let sha256 = sha256_file(&destination)?;

        Ok(PublishedSnapshot { source, destination, bytes, sha256 })
    }
}

/// Event ids become file names under fixed roots; anything that could walk out is refused.
fn check_event_id(event_id: &str) -> Result<(), SnapshotError> {
    let bad = event_id.is_empty()
        || event_id == "."
        || event_id == ".."
        || event_id.contains(['/', '\\', '\0']);
    if bad {
        return Err(SnapshotError::InvalidEventId(event_id.to_string()));
    }
    Ok(())
}

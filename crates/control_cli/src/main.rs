use chrono::DateTime;
use clap::{Parser, Subcommand};
use dotenvy::from_path as dotenv_from_path;
use frigate_event_log::EventLogStore;
use frigate_event_spec::ItemNames;
use frigate_pipeline::{
    Outcome, Pipeline, PipelineConfig, WriteReport, DEFAULT_CLIPS_DIR, DEFAULT_STREAM,
};
use frigate_snapshots::SnapshotPublisher;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event log error: {0}")]
    EventLog(#[from] frigate_event_log::EventLogError),
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("no config root: pass --config-root or set OPENHAB_CONF")]
    NoConfigRoot,
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

#[derive(Parser)]
#[command(
    name = "frigate-events",
    version,
    about = "Alert event log + snapshot publisher for camera event-end notifications"
)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one event-end notification through the filter and record writer.
    ///
    /// Attributes are host item states keyed by item name, e.g.
    /// fgDrivewayEventType=end. Prints a one-line JSON summary.
    Handle {
        /// Host config root (defaults to $OPENHAB_CONF)
        #[arg(long)]
        config_root: Option<PathBuf>,

        /// Detector clips dir (defaults to $FRIGATE_CLIPS_DIR, then /srv/camera/frigate/clips)
        #[arg(long)]
        clips_dir: Option<PathBuf>,

        /// Camera stream name (defaults to $FRIGATE_STREAM, then driveway)
        #[arg(long)]
        stream: Option<String>,

        /// JSON object file of item name -> state
        #[arg(long)]
        attributes: Option<PathBuf>,

        /// JSON file overriding the item names read for the stream
        /// (keys: state, eventId, zones, label, severity, hasSnapshot)
        #[arg(long)]
        items: Option<PathBuf>,

        /// Provide multiple times: --attr fgDrivewayEventType=end --attr ...
        #[arg(long = "attr")]
        attrs: Vec<String>,

        /// Record timestamp (RFC 3339); defaults to now
        #[arg(long)]
        ts: Option<String>,
    },

    /// Print the event log as a compact JSON array.
    List {
        #[arg(long)]
        config_root: Option<PathBuf>,
    },

    /// Check the event log is well formed and every record has a published image.
    ///
    /// Records without a published image whose clip is still in the clips dir
    /// are listed as recoverable. Exits non-zero if the log cannot be read or
    /// an entry is not a valid record.
    Verify {
        #[arg(long)]
        config_root: Option<PathBuf>,

        /// Detector clips dir (defaults to $FRIGATE_CLIPS_DIR, then /srv/camera/frigate/clips)
        #[arg(long)]
        clips_dir: Option<PathBuf>,

        /// Camera stream name (defaults to $FRIGATE_STREAM, then driveway)
        #[arg(long)]
        stream: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();
    match args.cmd {
        Command::Handle { config_root, clips_dir, stream, attributes, items, attrs, ts } => {
            load_env(config_root.as_deref());
            let mut config = PipelineConfig::new(
                resolve_config_root(config_root)?,
                resolve_clips_dir(clips_dir),
                resolve_stream(stream),
            );
            if let Some(path) = items {
                let names: ItemNames = serde_json::from_slice(&fs::read(&path)?)?;
                debug!("item names from {}: {names:?}", path.display());
                config = config.with_items(names);
            }

            let mut store = BTreeMap::new();
            if let Some(path) = attributes {
                store.extend(read_attribute_file(&path)?);
            }
            for kv in attrs {
                let (name, value) = kv.split_once('=').ok_or_else(|| {
                    CliError::InvalidArg(format!("--attr expects NAME=VALUE, got {kv:?}"))
                })?;
                store.insert(name.to_string(), value.to_string());
            }
            debug!("handling {} attributes for stream {}", store.len(), config.stream);

            let pipeline = Pipeline::new(&config);
            let outcome = match ts {
                Some(ts) => pipeline.handle_at(&store, DateTime::parse_from_rfc3339(&ts)?),
                None => pipeline.handle(&store),
            };

            println!("{}", serde_json::to_string(&outcome_summary(&outcome))?);
            Ok(())
        }

        Command::List { config_root } => {
            load_env(config_root.as_deref());
            let log = EventLogStore::in_config_root(resolve_config_root(config_root)?);
            let entries = log.read()?;

            // Print stable JSON array (no pretty print; callers can jq if needed).
            println!("{}", serde_json::to_string(&entries)?);
            Ok(())
        }

        Command::Verify { config_root, clips_dir, stream } => {
            load_env(config_root.as_deref());
            let root = resolve_config_root(config_root)?;
            let log = EventLogStore::in_config_root(&root);
            let snapshots = SnapshotPublisher::in_config_root(
                resolve_clips_dir(clips_dir),
                &root,
                resolve_stream(stream),
            );

            let records = log.records()?;
            let missing: Vec<&str> = records
                .iter()
                .filter(|r| !snapshots.is_published(&r.event_id))
                .map(|r| r.event_id.as_str())
                .collect();
            let recoverable: Vec<&str> = missing
                .iter()
                .copied()
                .filter(|id| snapshots.has_source(id))
                .collect();
            let bad_timestamps: Vec<&str> = records
                .iter()
                .filter(|r| r.timestamp().is_err())
                .map(|r| r.event_id.as_str())
                .collect();
            info!(
                "{}: {} records, {} without published snapshot ({} recoverable)",
                log.path().display(),
                records.len(),
                missing.len(),
                recoverable.len()
            );

            let summary = VerifySummary {
                records: records.len(),
                missing_snapshots: missing,
                recoverable,
                bad_timestamps,
            };
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
    }
}

/// Load `.env` from the config root or CWD (best-effort).
fn load_env(config_root: Option<&Path>) {
    let root_env = config_root.map(|r| r.join(".env"));
    match root_env {
        Some(p) if p.exists() => {
            let _ = dotenv_from_path(&p);
            debug!("loaded env from {}", p.display());
        }
        _ if Path::new(".env").exists() => {
            let _ = dotenv_from_path(".env");
            debug!("loaded env from ./.env");
        }
        _ => {}
    }
}

fn resolve_config_root(arg: Option<PathBuf>) -> Result<PathBuf, CliError> {
    arg.or_else(|| std::env::var_os("OPENHAB_CONF").map(PathBuf::from))
        .ok_or(CliError::NoConfigRoot)
}

fn resolve_clips_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os("FRIGATE_CLIPS_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIPS_DIR))
}

fn resolve_stream(arg: Option<String>) -> String {
    arg.or_else(|| std::env::var("FRIGATE_STREAM").ok())
        .unwrap_or_else(|| DEFAULT_STREAM.to_string())
}

/// Item states file: a JSON object. Non-string values keep their JSON text,
/// nulls are dropped.
fn read_attribute_file(path: &Path) -> Result<BTreeMap<String, String>, CliError> {
    let bytes = fs::read(path)?;
    let obj = match serde_json::from_slice::<JsonValue>(&bytes)? {
        JsonValue::Object(obj) => obj,
        _ => {
            return Err(CliError::InvalidArg(format!(
                "{} must hold a JSON object",
                path.display()
            )))
        }
    };
    Ok(obj
        .into_iter()
        .filter_map(|(k, v)| match v {
            JsonValue::Null => None,
            JsonValue::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifySummary<'a> {
    records: usize,
    missing_snapshots: Vec<&'a str>,
    /// Subset of `missing_snapshots` whose clip is still in the clips dir.
    recoverable: Vec<&'a str>,
    bad_timestamps: Vec<&'a str>,
}

/// One-line result of `handle`.
#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
enum HandleSummary<'a> {
    Skipped {
        reason: String,
    },
    Written {
        #[serde(rename = "eventId")]
        event_id: &'a str,
        snapshot: SnapshotSummary,
        record: RecordSummary<'a>,
    },
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum SnapshotSummary {
    Ok { path: String, bytes: u64, sha256: String },
    Error { error: String },
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum RecordSummary<'a> {
    Ok { entries: usize, time: &'a str },
    Error { error: String },
}

fn outcome_summary(outcome: &Outcome) -> HandleSummary<'_> {
    match outcome {
        Outcome::Skipped(reason) => HandleSummary::Skipped { reason: reason.to_string() },
        Outcome::Written(report) => written_summary(report),
    }
}

fn written_summary(report: &WriteReport) -> HandleSummary<'_> {
    let snapshot = match &report.snapshot {
        Ok(s) => SnapshotSummary::Ok {
            path: s.destination.display().to_string(),
            bytes: s.bytes,
            sha256: s.sha256.clone(),
        },
        Err(e) => SnapshotSummary::Error { error: e.to_string() },
    };
    let record = match &report.record {
        Ok(r) => RecordSummary::Ok { entries: r.entries, time: &r.record.time },
        Err(e) => RecordSummary::Error { error: e.to_string() },
    };
    HandleSummary::Written { event_id: &report.event_id, snapshot, record }
}

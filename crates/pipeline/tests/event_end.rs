use chrono::DateTime;
use frigate_event_spec::ItemNames;
use frigate_pipeline::{Outcome, Pipeline, PipelineConfig, SkipReason};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Rig {
    _td: TempDir,
    conf: PathBuf,
    clips: PathBuf,
    pipeline: Pipeline,
}

impl Rig {
    fn new() -> Self {
        let td = TempDir::new().unwrap();
        let conf = td.path().join("openhab");
        let clips = td.path().join("clips");
        fs::create_dir_all(&clips).unwrap();
        let pipeline = Pipeline::new(&PipelineConfig::new(&conf, &clips, "driveway"));
        Self { _td: td, conf, clips, pipeline }
    }

    fn log_path(&self) -> PathBuf {
        self.conf.join("html").join("data").join("frigate-events.json")
    }

    fn published(&self, id: &str) -> PathBuf {
        self.conf.join("html").join("camera").join(format!("{id}.jpg"))
    }

    fn write_clip(&self, id: &str, body: &[u8]) {
        fs::write(self.clips.join(format!("driveway-{id}.jpg")), body).unwrap();
    }

    fn read_log(&self) -> Vec<Value> {
        serde_json::from_slice(&fs::read(self.log_path()).unwrap()).unwrap()
    }
}

fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn scenario(id: &str, severity: &str, snapshot: &str) -> HashMap<String, String> {
    attrs(&[
        ("fgDrivewayEventType", "end"),
        ("fgDrivewayEventID", id),
        ("fgDrivewayCurEnteredZone", "[\"yard\",\"door\"]"),
        ("fgDrivewayCurLabel", "\"person\""),
        ("fgDrivewayCurMaxSeverity", severity),
        ("fgDrivewayCurHasSnapshot", snapshot),
    ])
}

fn fixed_now() -> chrono::DateTime<chrono::FixedOffset> {
    DateTime::parse_from_rfc3339("2024-06-01T18:22:10.250+02:00").unwrap()
}

fn dir_is_empty_or_missing(p: &Path) -> bool {
    !p.exists() || fs::read_dir(p).unwrap().next().is_none()
}

#[test]
fn alert_against_empty_log_writes_record_and_publishes_image() {
    let rig = Rig::new();
    rig.write_clip("123", b"jpeg-bytes-123");

    let out = rig
        .pipeline
        .handle_at(&scenario("123", "\"alert\"", "ON"), fixed_now());
    match out {
        Outcome::Written(report) => {
            assert!(report.snapshot.is_ok());
            assert_eq!(report.record.unwrap().entries, 1);
        }
        other => panic!("expected a write, got {other:?}"),
    }

    assert_eq!(
        rig.read_log(),
        vec![json!({
            "time": "2024-06-01T18:22:10.250+02:00",
            "eventId": "123",
            "label": "person",
            "zones": ["yard", "door"],
            "severity": "alert"
        })]
    );
    assert_eq!(fs::read(rig.published("123")).unwrap(), b"jpeg-bytes-123");
}

#[test]
fn warning_severity_leaves_everything_untouched() {
    let rig = Rig::new();
    rig.write_clip("123", b"jpeg");

    let out = rig
        .pipeline
        .handle_at(&scenario("123", "\"warning\"", "ON"), fixed_now());
    assert!(matches!(out, Outcome::Skipped(SkipReason::NotAlert(_))));
    assert!(!rig.log_path().exists());
    assert!(dir_is_empty_or_missing(&rig.conf.join("html").join("camera")));
}

#[test]
fn non_end_states_and_missing_snapshot_are_no_ops() {
    let rig = Rig::new();
    rig.write_clip("5", b"jpeg");

    for state in ["new", "update", "NULL"] {
        let mut a = scenario("5", "\"alert\"", "ON");
        a.insert("fgDrivewayEventType".into(), state.into());
        let out = rig.pipeline.handle_at(&a, fixed_now());
        assert!(matches!(out, Outcome::Skipped(SkipReason::NotTerminal(_))), "{state}");
    }

    let out = rig
        .pipeline
        .handle_at(&scenario("5", "\"alert\"", "OFF"), fixed_now());
    assert!(matches!(out, Outcome::Skipped(SkipReason::NoSnapshot { .. })));

    assert!(!rig.log_path().exists());
    assert!(!rig.published("5").exists());
}

#[test]
fn appends_after_existing_records_in_order() {
    let rig = Rig::new();
    let prior = json!([
        {"time": "2024-05-01T08:00:00+02:00", "eventId": "a", "label": "car", "zones": [], "severity": "alert"},
        {"time": "2024-05-02T08:00:00+02:00", "eventId": "b", "label": "dog", "zones": ["yard"], "severity": "alert", "note": "hand edited"}
    ]);
    fs::create_dir_all(rig.log_path().parent().unwrap()).unwrap();
    fs::write(rig.log_path(), serde_json::to_vec(&prior).unwrap()).unwrap();
    rig.write_clip("c", b"jpeg");

    rig.pipeline
        .handle_at(&scenario("c", "\"alert\"", "true"), fixed_now());

    let log = rig.read_log();
    assert_eq!(log.len(), 3);
    assert_eq!(&log[..2], prior.as_array().unwrap().as_slice());
    assert_eq!(log[2]["eventId"], "c");
}

#[test]
fn corrupt_log_is_discarded() {
    let rig = Rig::new();
    fs::create_dir_all(rig.log_path().parent().unwrap()).unwrap();
    fs::write(rig.log_path(), "[{\"eventId\":\"half").unwrap();
    rig.write_clip("7", b"jpeg");

    rig.pipeline
        .handle_at(&scenario("7", "\"alert\"", "ON"), fixed_now());

    let log = rig.read_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["eventId"], "7");
}

#[test]
fn missing_image_does_not_block_log_append() {
    let rig = Rig::new();

    let out = rig
        .pipeline
        .handle_at(&scenario("404", "\"alert\"", "ON"), fixed_now());
    match out {
        Outcome::Written(report) => {
            assert!(report.snapshot.is_err());
            assert!(report.record.is_ok());
        }
        other => panic!("expected a write, got {other:?}"),
    }
    assert_eq!(rig.read_log().len(), 1);
    assert!(!rig.published("404").exists());
}

#[test]
fn malformed_zones_still_publishes_image() {
    let rig = Rig::new();
    rig.write_clip("z", b"jpeg");
    let mut a = scenario("z", "\"alert\"", "ON");
    a.insert("fgDrivewayCurEnteredZone".into(), "yard".into());

    match rig.pipeline.handle_at(&a, fixed_now()) {
        Outcome::Written(report) => {
            assert!(report.snapshot.is_ok());
            assert!(report.record.is_err());
        }
        other => panic!("expected a write attempt, got {other:?}"),
    }
    assert!(rig.published("z").exists());
    assert!(!rig.log_path().exists());
}

#[test]
fn repeated_event_overwrites_image() {
    let rig = Rig::new();
    rig.write_clip("r", b"first");
    rig.pipeline
        .handle_at(&scenario("r", "\"alert\"", "ON"), fixed_now());
    rig.write_clip("r", b"second");
    rig.pipeline
        .handle_at(&scenario("r", "\"alert\"", "ON"), fixed_now());

    assert_eq!(fs::read(rig.published("r")).unwrap(), b"second");
    assert_eq!(rig.read_log().len(), 2);
}

#[test]
fn handle_stamps_current_time() {
    let rig = Rig::new();
    rig.write_clip("t", b"jpeg");
    match rig.pipeline.handle(&scenario("t", "\"alert\"", "ON")) {
        Outcome::Written(report) => {
            let rec = report.record.unwrap().record;
            assert!(rec.timestamp().is_ok());
        }
        other => panic!("expected a write, got {other:?}"),
    }
}

#[test]
fn overridden_item_names_are_read() {
    let td = TempDir::new().unwrap();
    let conf = td.path().join("openhab");
    let clips = td.path().join("clips");
    fs::create_dir_all(&clips).unwrap();
    fs::write(clips.join("gate-g1.jpg"), b"jpeg").unwrap();

    let items = ItemNames {
        state: "GateState".into(),
        event_id: "GateId".into(),
        zones: "GateZones".into(),
        label: "GateLabel".into(),
        severity: "GateSeverity".into(),
        has_snapshot: "GateSnap".into(),
    };
    let pipeline = Pipeline::new(&PipelineConfig::new(&conf, &clips, "gate").with_items(items));

    // default names for the stream are ignored
    let defaults = attrs(&[("fgGateEventType", "end"), ("fgGateEventID", "nope")]);
    assert!(matches!(
        pipeline.handle_at(&defaults, fixed_now()),
        Outcome::Skipped(SkipReason::NotTerminal(_))
    ));

    let custom = attrs(&[
        ("GateState", "end"),
        ("GateId", "g1"),
        ("GateZones", "[\"gate\"]"),
        ("GateLabel", "\"car\""),
        ("GateSeverity", "\"alert\""),
        ("GateSnap", "ON"),
    ]);
    match pipeline.handle_at(&custom, fixed_now()) {
        Outcome::Written(report) => {
            assert!(report.snapshot.is_ok());
            assert_eq!(report.record.unwrap().record.zones, vec!["gate".to_string()]);
        }
        other => panic!("expected a write, got {other:?}"),
    }
}

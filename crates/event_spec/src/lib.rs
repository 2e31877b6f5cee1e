//! frigate_event_spec
//!
//! Strongly-typed view of the camera event attributes and of the persisted
//! alert record.
//!
//! Attribute values arrive as raw host item states. Three of them
//! (`severity`, `label`, `zones`) are JSON documents encoded inside that
//! string and need a second, typed decode.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

// ----------------------------
// Attribute lookup
// ----------------------------

/// Read-only access to the host's current item states.
pub trait AttributeStore {
    fn get(&self, name: &str) -> Option<String>;
}

impl AttributeStore for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

impl AttributeStore for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

impl<T: AttributeStore + ?Sized> AttributeStore for &T {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

/// Item names carrying one camera stream's event attributes.
///
/// Deserializable so an operator can map streams whose items don't follow the
/// `fg<Stream>...` naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNames {
    pub state: String,
    pub event_id: String,
    pub zones: String,
    pub label: String,
    pub severity: String,
    pub has_snapshot: String,
}

impl ItemNames {
    /// `driveway` -> `fgDrivewayEventType`, `fgDrivewayEventID`, ...
    pub fn for_stream(stream: &str) -> Self {
        let mut chars = stream.chars();
        let camel = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        let item = |suffix: &str| format!("fg{camel}{suffix}");
        Self {
            state: item("EventType"),
            event_id: item("EventID"),
            zones: item("CurEnteredZone"),
            label: item("CurLabel"),
            severity: item("CurMaxSeverity"),
            has_snapshot: item("CurHasSnapshot"),
        }
    }
}

/// Host placeholders for an item that has never received a value.
const UNSET_STATES: [&str; 2] = ["NULL", "UNDEF"];

fn read_item(store: &dyn AttributeStore, name: &str) -> Option<String> {
    store
        .get(name)
        .filter(|v| !UNSET_STATES.contains(&v.as_str()))
}

/// Raw attribute snapshot for one event stream, as read from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAttributes {
    pub state: Option<String>,
    pub event_id: Option<String>,
    pub zones: Option<String>,
    pub label: Option<String>,
    pub severity: Option<String>,
    pub has_snapshot: Option<String>,
}

impl EventAttributes {
    pub fn read(store: &dyn AttributeStore, names: &ItemNames) -> Self {
        Self {
            state: read_item(store, &names.state),
            event_id: read_item(store, &names.event_id),
            zones: read_item(store, &names.zones),
            label: read_item(store, &names.label),
            severity: read_item(store, &names.severity),
            has_snapshot: read_item(store, &names.has_snapshot),
        }
    }

    pub fn event_state(&self) -> EventState {
        self.state
            .as_deref()
            .map(EventState::from)
            .unwrap_or(EventState::Unknown)
    }

    pub fn severity(&self) -> Result<Severity, DecodeError> {
        let raw = self.severity.as_deref().ok_or(DecodeError::Missing("severity"))?;
        decode_json_string("severity", raw).map(Severity::from)
    }

    pub fn snapshot_present(&self) -> bool {
        self.has_snapshot.as_deref().map(parse_flag).unwrap_or(false)
    }
}

// ----------------------------
// Typed values
// ----------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventState {
    New,
    Update,
    End,
    Unknown,
    Other(String),
}

impl From<&str> for EventState {
    fn from(s: &str) -> Self {
        match s {
            "new" => EventState::New,
            "update" => EventState::Update,
            "end" => EventState::End,
            other => EventState::Other(other.to_string()),
        }
    }
}

impl EventState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventState::End)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Alert,
    Detection,
    Other(String),
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.as_str() {
            "alert" => Severity::Alert,
            "detection" => Severity::Detection,
            _ => Severity::Other(s),
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Alert => "alert",
            Severity::Detection => "detection",
            Severity::Other(s) => s,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean-like item state: ON / true / 1 / yes (any case) are set.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

// ----------------------------
// Second-level JSON decode
// ----------------------------

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("attribute {0} is not set")]
    Missing(&'static str),
    #[error("attribute {field} is not valid JSON of the expected shape: {source}")]
    Malformed {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn decode_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, DecodeError> {
    serde_json::from_str(raw).map_err(|source| DecodeError::Malformed { field, source })
}

/// `"\"person\""` -> `person`
pub fn decode_json_string(field: &'static str, raw: &str) -> Result<String, DecodeError> {
    decode_json(field, raw)
}

/// `"[\"yard\",\"door\"]"` -> `["yard", "door"]`, order preserved.
pub fn decode_json_list(field: &'static str, raw: &str) -> Result<Vec<String>, DecodeError> {
    decode_json(field, raw)
}

// ----------------------------
// Persisted record
// ----------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// ISO-8601 with offset, e.g. 2024-06-01T18:22:10.123+02:00
    pub time: String,
    pub event_id: String,
    pub label: String,
    pub zones: Vec<String>,
    pub severity: Severity,
}

impl EventRecord {
    /// Build a record from raw attributes, decoding `zones` and `label`.
    pub fn from_attributes(
        time: DateTime<FixedOffset>,
        event_id: impl Into<String>,
        raw_zones: &str,
        raw_label: &str,
        severity: Severity,
    ) -> Result<Self, DecodeError> {
        let zones = decode_json_list("zones", raw_zones)?;
        let label = decode_json_string("label", raw_label)?;
        Ok(Self {
            time: format_timestamp(&time),
            event_id: event_id.into(),
            label,
            zones,
            severity,
        })
    }

    pub fn timestamp(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.time)
    }
}

/// ISO-8601 offset form; the offset is always numeric (`+00:00`, never `Z`)
/// and the fraction is 0, 3, 6 or 9 digits.
///
/// Logs written by the old openHAB rule used Java's `ISO_OFFSET_DATE_TIME`,
/// which prints `Z` for UTC and trims trailing fraction zeros. Both forms are
/// RFC 3339, so mixed logs still parse with `EventRecord::timestamp`, but the
/// bytes differ.
pub fn format_timestamp(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

//! Decides whether an attribute snapshot is worth persisting.

use frigate_event_spec::{EventAttributes, EventState, Severity};
use std::fmt;
use tracing::{info, warn};

/// An ended alert with a snapshot; `zones` and `label` are still JSON-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedEvent {
    pub event_id: String,
    pub zones: Option<String>,
    pub label: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotTerminal(EventState),
    NotAlert(Severity),
    MalformedSeverity(String),
    NoSnapshot {
        event_id: Option<String>,
        label: Option<String>,
    },
    MissingEventId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotTerminal(state) => write!(f, "event state {state:?} is not end"),
            SkipReason::NotAlert(sev) => write!(f, "severity {sev} is not alert"),
            SkipReason::MalformedSeverity(e) => write!(f, "unreadable severity: {e}"),
            SkipReason::NoSnapshot { event_id, label } => write!(
                f,
                "no snapshot for eventId={}, label={}",
                event_id.as_deref().unwrap_or("-"),
                label.as_deref().unwrap_or("-")
            ),
            SkipReason::MissingEventId => f.write_str("ended alert has no event id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Persist(QualifiedEvent),
    Skip(SkipReason),
}

/// State must be `end`, severity `alert`, and a snapshot must exist.
///
/// Every state other than `end` is the idle path and stays silent; the other
/// rejections leave a diagnostic line.
pub fn evaluate(attrs: &EventAttributes) -> Decision {
    let state = attrs.event_state();
    if !state.is_terminal() {
        return Decision::Skip(SkipReason::NotTerminal(state));
    }

    let severity = match attrs.severity() {
        Ok(Severity::Alert) => Severity::Alert,
        Ok(other) => {
            info!("ignoring event as severity is {other}, not alert");
            return Decision::Skip(SkipReason::NotAlert(other));
        }
        Err(e) => {
            warn!("ignoring event: {e}");
            return Decision::Skip(SkipReason::MalformedSeverity(e.to_string()));
        }
    };

    if !attrs.snapshot_present() {
        let reason = SkipReason::NoSnapshot {
            event_id: attrs.event_id.clone(),
            label: attrs.label.clone(),
        };
        info!("{reason}, severity={severity}: skipping");
        return Decision::Skip(reason);
    }

    let Some(event_id) = attrs.event_id.clone() else {
        warn!("ignoring alert with snapshot: event id is not set");
        return Decision::Skip(SkipReason::MissingEventId);
    };

    Decision::Persist(QualifiedEvent {
        event_id,
        zones: attrs.zones.clone(),
        label: attrs.label.clone(),
        severity,
    })
}

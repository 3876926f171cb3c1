pub mod time;
pub mod workflow;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const ATTR_PREVIOUS: &str = "previous";
pub const ATTR_CURRENT: &str = "current";
pub const ATTR_FORMER_TIMESTAMP: &str = "former_timestamp";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    NewSource,
    SourceMissing,
    EntityMissing,
    StateTransition,
    StaleSnapshotWarning,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewSource => "new-source",
            EventKind::SourceMissing => "source-missing",
            EventKind::EntityMissing => "entity-missing",
            EventKind::StateTransition => "state-transition",
            EventKind::StaleSnapshotWarning => "stale-snapshot-warning",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new-source" => Ok(EventKind::NewSource),
            "source-missing" => Ok(EventKind::SourceMissing),
            "entity-missing" => Ok(EventKind::EntityMissing),
            "state-transition" => Ok(EventKind::StateTransition),
            "stale-snapshot-warning" => Ok(EventKind::StaleSnapshotWarning),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// A discrete change derived from comparing two snapshots.
///
/// Field names on the wire follow the deployment/VM vocabulary of the event files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Event {
    #[serde(rename = "event_time", with = "time::serde_event_time")]
    #[builder(setter(transform = |t: DateTime<Utc>| time::truncate_to_millis(t)))]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "deployment")]
    #[builder(default, setter(strip_option, into))]
    pub source: Option<String>,

    #[serde(rename = "vm")]
    #[builder(default, setter(strip_option, into))]
    pub entity: Option<String>,

    pub kind: EventKind,

    #[builder(setter(into))]
    pub message: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[builder(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new_source(now: DateTime<Utc>, source: &str) -> Self {
        Event::builder()
            .timestamp(now)
            .source(source)
            .kind(EventKind::NewSource)
            .message("New deployment during this run")
            .build()
    }

    pub fn source_missing(now: DateTime<Utc>, source: &str) -> Self {
        Event::builder()
            .timestamp(now)
            .source(source)
            .kind(EventKind::SourceMissing)
            .message("no metrics for deployment on this run")
            .build()
    }

    pub fn entity_missing(now: DateTime<Utc>, source: &str, entity: &str) -> Self {
        Event::builder()
            .timestamp(now)
            .source(source)
            .entity(entity)
            .kind(EventKind::EntityMissing)
            .message("no metric for VM on this run")
            .build()
    }

    pub fn state_transition(
        now: DateTime<Utc>,
        source: &str,
        entity: &str,
        previous: &str,
        current: &str,
    ) -> Self {
        let attributes = BTreeMap::from([
            (ATTR_PREVIOUS.to_string(), previous.to_string()),
            (ATTR_CURRENT.to_string(), current.to_string()),
        ]);
        Event::builder()
            .timestamp(now)
            .source(source)
            .entity(entity)
            .kind(EventKind::StateTransition)
            .message(format!("transition from {previous} to {current}"))
            .attributes(attributes)
            .build()
    }

    pub fn stale_snapshot(
        now: DateTime<Utc>,
        former_timestamp: DateTime<Utc>,
        freshness_window_secs: u64,
    ) -> Self {
        let former = time::format_event_time(&former_timestamp);
        Event::builder()
            .timestamp(now)
            .kind(EventKind::StaleSnapshotWarning)
            .message(format!(
                "The last run has a timestamp older than {freshness_window_secs} seconds: {former}"
            ))
            .attributes(BTreeMap::from([(ATTR_FORMER_TIMESTAMP.to_string(), former)]))
            .build()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Stable sort by timestamp; events sharing a timestamp keep their insertion order.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(|event| event.timestamp);
}

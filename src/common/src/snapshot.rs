use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Member states reported by the service catalog, indexed by the gauge value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerfState {
    None,
    Alive,
    Leaving,
    Left,
    Failed,
}

impl SerfState {
    const ORDINALS: [SerfState; 5] = [
        SerfState::None,
        SerfState::Alive,
        SerfState::Leaving,
        SerfState::Left,
        SerfState::Failed,
    ];

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ORDINALS.get(idx).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SerfState::None => "None",
            SerfState::Alive => "Alive",
            SerfState::Leaving => "Leaving",
            SerfState::Left => "Left",
            SerfState::Failed => "Failed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    Serf(SerfState),
    Raw(String),
}

impl StateValue {
    pub fn raw(value: impl Into<String>) -> Self {
        StateValue::Raw(value.into())
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateValue::Serf(state) => f.write_str(state.as_str()),
            StateValue::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<SerfState> for StateValue {
    fn from(state: SerfState) -> Self {
        StateValue::Serf(state)
    }
}

/// entity-id -> state of one source.
pub type EntityStates = BTreeMap<String, StateValue>;

/// Point-in-time copy of every observed entity state, grouped by source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, EntityStates>,
}

impl StateSnapshot {
    pub fn new(timestamp: DateTime<Utc>, metrics: BTreeMap<String, EntityStates>) -> Self {
        StateSnapshot { timestamp, metrics }
    }

    pub fn source(&self, source: &str) -> Option<&EntityStates> {
        self.metrics.get(source)
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.metrics.contains_key(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn entity_count(&self) -> usize {
        self.metrics.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

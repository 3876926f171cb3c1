use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::{serde_event_time, serde_event_time_option, truncate_to_millis};

/// One recovery workflow as seen for a single entity, from its start trigger to its
/// recovery trigger. `recovered_time` stays `None` when the logs end before recovery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEvent {
    pub deployment: String,
    #[serde(rename = "vm")]
    pub entity: String,
    pub workflow_id: String,
    #[serde(with = "serde_event_time")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "serde_event_time_option")]
    pub recovered_time: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl WorkflowEvent {
    pub fn open(
        deployment: impl Into<String>,
        entity: impl Into<String>,
        workflow_id: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        WorkflowEvent {
            deployment: deployment.into(),
            entity: entity.into(),
            workflow_id: workflow_id.into(),
            start_time: truncate_to_millis(start_time),
            recovered_time: None,
            attempts: 0,
        }
    }

    pub fn increment_attempts(&mut self) {
        self.attempts += 1;
    }

    pub fn close(&mut self, recovered_time: DateTime<Utc>) {
        self.recovered_time = Some(truncate_to_millis(recovered_time));
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered_time.is_some()
    }
}

/// File name prefix of the monthly state-transition event files.
pub const STATE_EVENTS_PREFIX: &str = "consul-events";
/// File name prefix of the monthly workflow event files.
pub const WORKFLOW_EVENTS_PREFIX: &str = "workflow-events";

pub const SNAPSHOT_LOCK_NAME: &str = "consul-events-generator";
pub const WORKFLOW_LOCK_NAME: &str = "workflow-events-generator";

/// Section of the exposition page holding the per-entity states.
pub const METRICS_SECTION_MARKER: &str = "# TYPE status gauge";
pub const METRICS_LINE_KEY: &str = "status{";
pub const METRICS_PATH: &str = "/metrics";

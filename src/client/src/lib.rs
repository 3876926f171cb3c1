pub mod config_manager;
pub mod exporters;
pub mod guard;
pub mod runs;

pub use config_manager::{ConfigLoader, ScoutConfig};
pub use guard::SingleInstanceGuard;
pub use runs::{RunSummary, SnapshotRun, WorkflowOptions, WorkflowOutput, WorkflowRun};

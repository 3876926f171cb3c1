pub mod atomic;
pub mod csv;
pub mod event_store;
pub mod snapshot_store;

pub use event_store::{EventRecord, EventStore, OutputFormat};
pub use snapshot_store::SnapshotStore;

pub mod coerce;
pub mod constants;
pub mod error;
pub mod event;
pub mod snapshot;

pub use error::{CollectionError, MetricsParseError, ScoutError, ScoutResult};
pub use event::workflow::WorkflowEvent;
pub use event::{Event, EventKind};
pub use snapshot::{EntityStates, SerfState, StateSnapshot, StateValue};

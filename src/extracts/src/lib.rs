pub mod collector;
pub mod diff;
pub mod metrics;
pub mod workflow;

pub use collector::{
    CollectionFailure, CollectionReport, CollectorSettings, ConcurrentCollector, HttpFetcher,
    MetricsFetcher, MetricsSource,
};
pub use diff::SnapshotDiff;
pub use metrics::parse_metrics;

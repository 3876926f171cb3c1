//! The two producer runs: metrics snapshots and recovery workflows.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scout_common::constants::{SNAPSHOT_LOCK_NAME, WORKFLOW_LOCK_NAME};
use scout_common::event::sort_events;
use scout_common::{ScoutError, ScoutResult, WorkflowEvent};
use scout_extracts::workflow::{correlate_deployments, read_deployment_logs, recent_cutoff};
use scout_extracts::{ConcurrentCollector, HttpFetcher, MetricsFetcher, SnapshotDiff};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::config_manager::ScoutConfig;
use crate::exporters::csv::encode_record;
use crate::exporters::{EventRecord, EventStore, OutputFormat, SnapshotStore};
use crate::guard::SingleInstanceGuard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub events_written: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub files: Vec<PathBuf>,
}

pub struct SnapshotRun<F: MetricsFetcher> {
    config: ScoutConfig,
    collector: ConcurrentCollector<F>,
}

impl SnapshotRun<HttpFetcher> {
    pub fn from_config(config: ScoutConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.collector_settings().request_timeout)
            .context("failed to build HTTP client")?;
        Ok(SnapshotRun::new(config, fetcher))
    }
}

impl<F: MetricsFetcher> SnapshotRun<F> {
    pub fn new(config: ScoutConfig, fetcher: F) -> Self {
        let collector = ConcurrentCollector::new(fetcher, config.collector_settings());
        SnapshotRun { config, collector }
    }

    /// Scrapes every source, diffs against the saved snapshot, appends the events to
    /// this month's CSV and JSON files and saves the new snapshot.
    ///
    /// Everything after source resolution happens while holding the instance lock.
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let sources = self.config.resolve_sources()?;

        let _guard = SingleInstanceGuard::acquire(&self.config.lock_dir, SNAPSHOT_LOCK_NAME)?;
        info!(sources = sources.len(), "collecting metrics and generating events");

        let snapshots = SnapshotStore::new(&self.config.state_file);
        let former = snapshots.load()?;

        let report = self.collector.collect(&sources).await;
        let sources_succeeded = report.succeeded();
        let sources_failed = report.failures.len();
        let current = report.into_snapshot(now)?;

        let diff = SnapshotDiff::new(self.config.freshness_window());
        let mut events = diff.diff(former.as_ref(), &current, now);
        sort_events(&mut events);

        let store = EventStore::new(&self.config.output_dir);
        let mut files = store.append(&events, OutputFormat::Csv)?;
        files.extend(store.append(&events, OutputFormat::Json)?);

        snapshots.save(&current)?;

        info!(
            events = events.len(),
            sources_succeeded, sources_failed, "snapshot run complete"
        );
        Ok(RunSummary {
            events_written: events.len(),
            sources_succeeded,
            sources_failed,
            files,
        })
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct WorkflowOptions {
    pub files: Vec<PathBuf>,
    #[builder(default = OutputFormat::Json)]
    pub format: OutputFormat,
    #[builder(default)]
    pub recent: bool,
    #[builder(default)]
    pub to_stdout: bool,
}

#[derive(Debug)]
pub enum WorkflowOutput {
    Appended(Vec<PathBuf>),
    Rendered(String),
}

pub struct WorkflowRun {
    config: ScoutConfig,
}

impl WorkflowRun {
    pub fn new(config: ScoutConfig) -> Self {
        WorkflowRun { config }
    }

    /// Reads the log files and correlates them into workflows ordered by start time.
    pub fn derive(&self, options: &WorkflowOptions, now: DateTime<Utc>) -> ScoutResult<Vec<WorkflowEvent>> {
        let since = options
            .recent
            .then(|| recent_cutoff(now, self.config.recent_days));
        let logs = read_deployment_logs(&options.files, since)?;
        let events = correlate_deployments(logs);
        info!(workflows = events.len(), "correlated workflow events");
        Ok(events)
    }

    pub fn execute(&self, options: &WorkflowOptions, now: DateTime<Utc>) -> Result<WorkflowOutput> {
        if options.to_stdout {
            let events = self.derive(options, now)?;
            return Ok(WorkflowOutput::Rendered(render(&events, options.format)?));
        }

        let _guard = SingleInstanceGuard::acquire(&self.config.lock_dir, WORKFLOW_LOCK_NAME)?;
        let events = self.derive(options, now)?;
        if events.is_empty() {
            warn!("no workflow events found in the given logs");
        }
        let files = EventStore::new(&self.config.output_dir).append(&events, options.format)?;
        Ok(WorkflowOutput::Appended(files))
    }
}

/// Text form of a batch of records: CSV with its header, or a JSON array.
pub fn render<R: EventRecord>(events: &[R], format: OutputFormat) -> ScoutResult<String> {
    match format {
        OutputFormat::Csv => {
            let mut out = String::from(R::CSV_HEADER);
            out.push('\n');
            for event in events {
                out.push_str(&encode_record(&event.to_csv_fields()));
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => serde_json::to_string_pretty(events).map_err(|source| {
            ScoutError::Serialization {
                what: "events",
                source,
            }
        }),
    }
}

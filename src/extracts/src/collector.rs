//! Concurrent scraping of the `/metrics` pages of every configured deployment.
//!
//! Each source is fetched exactly once per pass on a bounded pool of tasks. A source
//! that fails (network, status, timeout, parse) is reported and left out; the pass as
//! a whole only fails when nothing at all could be collected.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scout_common::constants::METRICS_PATH;
use scout_common::{CollectionError, EntityStates, ScoutError, ScoutResult, StateSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::metrics::parse_metrics_bytes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSource {
    pub name: String,
    pub address: String,
}

impl MetricsSource {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        MetricsSource {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn metrics_url(&self) -> String {
        format!("http://{}{}", self.address, METRICS_PATH)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    pub max_workers: usize,
    pub request_timeout: Duration,
    pub gather_timeout: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            max_workers: 8,
            request_timeout: Duration::from_secs(10),
            gather_timeout: Duration::from_secs(60),
        }
    }
}

/// Retrieves the raw metrics page of one source.
pub trait MetricsFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        source: &MetricsSource,
    ) -> impl Future<Output = Result<Vec<u8>, CollectionError>> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpFetcher { client, timeout })
    }

    fn request_error(&self, url: String, source: reqwest::Error) -> CollectionError {
        if source.is_timeout() {
            CollectionError::Timeout {
                url,
                timeout: self.timeout,
            }
        } else {
            CollectionError::Request { url, source }
        }
    }
}

impl MetricsFetcher for HttpFetcher {
    async fn fetch(&self, source: &MetricsSource) -> Result<Vec<u8>, CollectionError> {
        let url = source.metrics_url();
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.request_error(url, e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(CollectionError::Status {
                url,
                status: status.as_u16(),
            });
        }

        match response.bytes().await {
            Ok(body) => Ok(body.to_vec()),
            Err(e) => Err(self.request_error(url, e)),
        }
    }
}

#[derive(Debug)]
pub struct CollectionFailure {
    pub source: MetricsSource,
    pub error: CollectionError,
}

#[derive(Debug, Default)]
pub struct CollectionReport {
    pub attempted: usize,
    pub metrics: BTreeMap<String, EntityStates>,
    pub failures: Vec<CollectionFailure>,
}

impl CollectionReport {
    pub fn succeeded(&self) -> usize {
        self.metrics.len()
    }

    /// Builds the snapshot of this pass. Zero successful sources is fatal.
    pub fn into_snapshot(self, now: DateTime<Utc>) -> ScoutResult<StateSnapshot> {
        if self.metrics.is_empty() {
            return Err(ScoutError::TotalCollectionFailure {
                attempted: self.attempted,
            });
        }
        Ok(StateSnapshot::new(now, self.metrics))
    }
}

pub struct ConcurrentCollector<F: MetricsFetcher> {
    fetcher: Arc<F>,
    settings: CollectorSettings,
}

impl<F: MetricsFetcher> ConcurrentCollector<F> {
    pub fn new(fetcher: F, settings: CollectorSettings) -> Self {
        ConcurrentCollector {
            fetcher: Arc::new(fetcher),
            settings,
        }
    }

    pub async fn collect(&self, sources: &[MetricsSource]) -> CollectionReport {
        let mut report = CollectionReport {
            attempted: sources.len(),
            ..Default::default()
        };

        if sources.is_empty() {
            warn!("no metrics sources configured");
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));
        let mut join_set = JoinSet::new();
        let mut pending: HashMap<Id, MetricsSource> = HashMap::new();

        for source in sources {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let task_source = source.clone();
            let request_timeout = self.settings.request_timeout;

            let handle = join_set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_states(&*fetcher, &task_source, request_timeout).await,
                    Err(_) => Err(CollectionError::Task {
                        source_name: task_source.name.clone(),
                        reason: "worker pool closed".to_string(),
                    }),
                };
                (task_source, outcome)
            });
            pending.insert(handle.id(), source.clone());
        }

        let deadline = tokio::time::Instant::now() + self.settings.gather_timeout;

        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next_with_id()).await {
                Ok(Some(Ok((id, (source, outcome))))) => {
                    pending.remove(&id);
                    match outcome {
                        Ok(states) => {
                            debug!(source = %source.name, entities = states.len(), "collected metrics");
                            report.metrics.insert(source.name, states);
                        }
                        Err(error) => report.record_failure(source, error),
                    }
                }
                Ok(Some(Err(join_error))) => {
                    if let Some(source) = pending.remove(&join_error.id()) {
                        let error = CollectionError::Task {
                            source_name: source.name.clone(),
                            reason: join_error.to_string(),
                        };
                        report.record_failure(source, error);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        unfinished = pending.len(),
                        gather_timeout = ?self.settings.gather_timeout,
                        "collection deadline expired, cancelling outstanding requests"
                    );
                    join_set.shutdown().await;
                    break;
                }
            }
        }

        let mut expired: Vec<MetricsSource> = pending.into_values().collect();
        expired.sort_by(|a, b| a.name.cmp(&b.name));
        for source in expired {
            let error = CollectionError::DeadlineExpired {
                source_name: source.name.clone(),
            };
            report.record_failure(source, error);
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            "collection pass finished"
        );
        report
    }
}

impl CollectionReport {
    fn record_failure(&mut self, source: MetricsSource, error: CollectionError) {
        warn!(source = %source.name, address = %source.address, "couldn't collect metrics: {error}");
        self.failures.push(CollectionFailure { source, error });
    }
}

async fn fetch_states<F: MetricsFetcher>(
    fetcher: &F,
    source: &MetricsSource,
    request_timeout: Duration,
) -> Result<EntityStates, CollectionError> {
    let body = tokio::time::timeout(request_timeout, fetcher.fetch(source))
        .await
        .map_err(|_| CollectionError::Timeout {
            url: source.metrics_url(),
            timeout: request_timeout,
        })??;
    Ok(parse_metrics_bytes(&body)?)
}

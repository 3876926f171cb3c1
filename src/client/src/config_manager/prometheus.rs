use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as RConfig, File, FileFormat};
use scout_extracts::MetricsSource;
use serde::Deserialize;
use tracing::warn;

const TENANT_LABEL: &str = "tenant";

#[derive(Debug, Deserialize)]
struct PrometheusConfig {
    scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Deserialize)]
struct ScrapeConfig {
    #[serde(default)]
    static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Deserialize)]
struct StaticConfig {
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

/// Reads the first scrape job of a Prometheus config: each static config becomes one
/// source, named by its `tenant` label and addressed by its first target.
pub fn read_scrape_targets(path: &Path) -> Result<Vec<MetricsSource>> {
    let path_str = path
        .to_str()
        .with_context(|| format!("scrape config path is not valid UTF-8: {}", path.display()))?;

    let prometheus: PrometheusConfig = RConfig::builder()
        .add_source(File::new(path_str, FileFormat::Yaml).required(true))
        .build()
        .and_then(|c| c.try_deserialize())
        .with_context(|| format!("failed to read scrape config {}", path.display()))?;

    let first_job = prometheus
        .scrape_configs
        .into_iter()
        .next()
        .with_context(|| format!("no scrape_configs in {}", path.display()))?;

    let mut sources = Vec::new();
    for static_config in first_job.static_configs {
        let (Some(name), Some(address)) = (
            static_config.labels.get(TENANT_LABEL),
            static_config.targets.first(),
        ) else {
            warn!(path = %path.display(), "skipping static config without tenant label or target");
            continue;
        };
        sources.push(MetricsSource::new(name.as_str(), address.as_str()));
    }
    Ok(sources)
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as RConfig, Environment, File, FileFormat};
use scout_extracts::{CollectorSettings, MetricsSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prometheus::read_scrape_targets;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/scout/scout.toml";
const ENV_PREFIX: &str = "SCOUT";

const STATE_FILE: &str = "/var/lib/scout/consul-events.state.json";
const OUTPUT_DIR: &str = "/var/lib/scout/events";
const LOCK_DIR: &str = "/run/lock/scout";
const LOG_DIR: &str = "/var/log/scout";
const FRESH_TIME_SECS: u64 = 300;
const HTTP_TIMEOUT_SECS: u64 = 10;
const GATHER_TIMEOUT_SECS: u64 = 60;
const MAX_WORKERS: u64 = 8;
const RECENT_DAYS: u64 = 7;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScoutConfig {
    pub state_file: PathBuf,
    pub output_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub log_dir: PathBuf,

    pub fresh_time_secs: u64,
    pub http_timeout_secs: u64,
    pub gather_timeout_secs: u64,
    pub max_workers: usize,
    pub recent_days: u64,

    #[serde(default)]
    pub prometheus_cfg: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<MetricsSource>,
}

impl ScoutConfig {
    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            max_workers: self.max_workers,
            request_timeout: Duration::from_secs(self.http_timeout_secs),
            gather_timeout: Duration::from_secs(self.gather_timeout_secs),
        }
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.fresh_time_secs)
    }

    /// Sources listed in the config file followed by the targets of the Prometheus
    /// scrape config, if one is set. A name listed twice keeps its first address.
    pub fn resolve_sources(&self) -> Result<Vec<MetricsSource>> {
        let mut sources = self.sources.clone();

        if let Some(path) = &self.prometheus_cfg {
            let targets = read_scrape_targets(path)?;
            debug!(path = %path.display(), targets = targets.len(), "read scrape config");
            for target in targets {
                if !sources.iter().any(|s| s.name == target.name) {
                    sources.push(target);
                }
            }
        }

        Ok(sources)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the TOML file (`path`, or the system file when present), then
    /// `SCOUT_*` environment variables.
    pub fn load_config(path: Option<&str>) -> Result<ScoutConfig> {
        let mut builder = RConfig::builder();

        builder = builder
            .set_default("state_file", STATE_FILE)?
            .set_default("output_dir", OUTPUT_DIR)?
            .set_default("lock_dir", LOCK_DIR)?
            .set_default("log_dir", LOG_DIR)?
            .set_default("fresh_time_secs", FRESH_TIME_SECS)?
            .set_default("http_timeout_secs", HTTP_TIMEOUT_SECS)?
            .set_default("gather_timeout_secs", GATHER_TIMEOUT_SECS)?
            .set_default("max_workers", MAX_WORKERS)?
            .set_default("recent_days", RECENT_DAYS)?;

        builder = match path {
            Some(path) => builder.add_source(File::new(path, FileFormat::Toml).required(true)),
            None => builder.add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: ScoutConfig = builder
            .build()?
            .try_deserialize()
            .context("failed to parse config file")?;

        info!(
            config_file = path.unwrap_or(DEFAULT_CONFIG_PATH),
            sources = config.sources.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn load_config_at(path: &Path) -> Result<ScoutConfig> {
        let path = path
            .to_str()
            .with_context(|| format!("config path is not valid UTF-8: {}", path.display()))?;
        Self::load_config(Some(path))
    }
}

//! Recovery workflow extraction from orchestration service logs.
pub mod classifier;
pub mod correlator;
pub mod logfile;

use chrono::{DateTime, NaiveDateTime, Utc};
use scout_common::{ScoutError, ScoutResult};

pub use classifier::{classify, is_relevant, Trigger};
pub use correlator::{correlate, correlate_deployments};
pub use logfile::{deployment_name, read_deployment_logs, recent_cutoff};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One relevant log line with its parsed (UTC) timestamp and the triggers it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub triggers: Vec<Trigger>,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        let text = text.into();
        let triggers = classify(&text);
        LogLine {
            timestamp,
            text,
            triggers,
        }
    }

    /// Lines start with `YYYY-MM-DD HH:MM:SS,mmm`; a `.` before the millis is accepted too.
    pub fn parse(text: &str) -> ScoutResult<Self> {
        let text = text.trim_end();
        Ok(LogLine::new(parse_timestamp(text)?, text))
    }

    /// Like `parse`, for a line whose triggers are already known.
    pub fn with_triggers(text: &str, triggers: Vec<Trigger>) -> ScoutResult<Self> {
        let text = text.trim_end();
        Ok(LogLine {
            timestamp: parse_timestamp(text)?,
            text: text.to_string(),
            triggers,
        })
    }
}

fn parse_timestamp(text: &str) -> ScoutResult<DateTime<Utc>> {
    let mut fields = text.split_whitespace();
    let (Some(date), Some(time)) = (fields.next(), fields.next()) else {
        return Err(ScoutError::malformed("log line", format!("no timestamp: {text}")));
    };

    let stamp = format!("{date} {}", time.replace(',', "."));
    NaiveDateTime::parse_from_str(&stamp, LOG_TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| ScoutError::malformed("log line", format!("{e}: {text}")))
}

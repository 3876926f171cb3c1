//! Append-only monthly event files.
//!
//! Every record type owns a file prefix; records land in
//! `<output_dir>/<prefix>-<year>-<month>.<csv|json>` by the year and month of their
//! event time (the month is not zero-padded). An append re-reads the current file,
//! keeps what is already there untouched and rewrites the whole file atomically.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use itertools::Itertools;
use scout_common::constants::{STATE_EVENTS_PREFIX, WORKFLOW_EVENTS_PREFIX};
use scout_common::event::time::{format_event_time, parse_event_time};
use scout_common::event::{ATTR_CURRENT, ATTR_FORMER_TIMESTAMP, ATTR_PREVIOUS};
use scout_common::{Event, EventKind, ScoutError, ScoutResult, WorkflowEvent};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::atomic::atomic_write;
use super::csv::{encode_record, parse_record, split_records};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// A record that can be kept in a monthly event file.
pub trait EventRecord: Serialize + DeserializeOwned {
    const FILE_PREFIX: &'static str;
    const CSV_HEADER: &'static str;

    /// Decides which monthly file the record belongs to.
    fn event_time(&self) -> DateTime<Utc>;

    fn to_csv_fields(&self) -> Vec<String>;

    fn from_csv_fields(fields: &[String]) -> Result<Self, String>;
}

fn field<'a>(fields: &'a [String], idx: usize, name: &str) -> Result<&'a str, String> {
    fields
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| format!("missing {name} column"))
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn time_field(fields: &[String], idx: usize, name: &str) -> Result<DateTime<Utc>, String> {
    let value = field(fields, idx, name)?;
    parse_event_time(value).map_err(|e| format!("bad {name} {value:?}: {e}"))
}

impl EventRecord for Event {
    const FILE_PREFIX: &'static str = STATE_EVENTS_PREFIX;
    const CSV_HEADER: &'static str = "Event Time,Kind,Deployment,VM,Event Message,Previous Value,Current Value,Former Snapshot Time";

    fn event_time(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn to_csv_fields(&self) -> Vec<String> {
        let attribute = |key: &str| self.attribute(key).unwrap_or_default().to_string();
        vec![
            format_event_time(&self.timestamp),
            self.kind.to_string(),
            self.source.clone().unwrap_or_default(),
            self.entity.clone().unwrap_or_default(),
            self.message.clone(),
            attribute(ATTR_PREVIOUS),
            attribute(ATTR_CURRENT),
            attribute(ATTR_FORMER_TIMESTAMP),
        ]
    }

    fn from_csv_fields(fields: &[String]) -> Result<Self, String> {
        if fields.len() != 8 {
            return Err(format!("expected 8 columns, found {}", fields.len()));
        }

        let attributes: BTreeMap<String, String> = [ATTR_PREVIOUS, ATTR_CURRENT, ATTR_FORMER_TIMESTAMP]
            .into_iter()
            .zip(&fields[5..])
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        Ok(Event {
            timestamp: time_field(fields, 0, "event time")?,
            kind: field(fields, 1, "kind")?.parse::<EventKind>()?,
            source: optional(field(fields, 2, "deployment")?),
            entity: optional(field(fields, 3, "vm")?),
            message: field(fields, 4, "message")?.to_string(),
            attributes,
        })
    }
}

impl EventRecord for WorkflowEvent {
    const FILE_PREFIX: &'static str = WORKFLOW_EVENTS_PREFIX;
    const CSV_HEADER: &'static str =
        "Deployment,VM,Workflow ID,Start Time (UTC),Recovered Time (UTC),Attempts";

    fn event_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn to_csv_fields(&self) -> Vec<String> {
        vec![
            self.deployment.clone(),
            self.entity.clone(),
            self.workflow_id.clone(),
            format_event_time(&self.start_time),
            self.recovered_time
                .as_ref()
                .map(format_event_time)
                .unwrap_or_default(),
            self.attempts.to_string(),
        ]
    }

    fn from_csv_fields(fields: &[String]) -> Result<Self, String> {
        if fields.len() != 6 {
            return Err(format!("expected 6 columns, found {}", fields.len()));
        }

        let recovered_time = match field(fields, 4, "recovered time")? {
            "" => None,
            _ => Some(time_field(fields, 4, "recovered time")?),
        };
        let attempts = field(fields, 5, "attempts")?;

        Ok(WorkflowEvent {
            deployment: field(fields, 0, "deployment")?.to_string(),
            entity: field(fields, 1, "vm")?.to_string(),
            workflow_id: field(fields, 2, "workflow id")?.to_string(),
            start_time: time_field(fields, 3, "start time")?,
            recovered_time,
            attempts: attempts
                .parse()
                .map_err(|e| format!("bad attempts {attempts:?}: {e}"))?,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventFile<T> {
    events: Vec<T>,
}

pub struct EventStore<R> {
    output_dir: PathBuf,
    record: PhantomData<fn() -> R>,
}

impl<R: EventRecord> EventStore<R> {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        EventStore {
            output_dir: output_dir.into(),
            record: PhantomData,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, year: i32, month: u32, format: OutputFormat) -> PathBuf {
        self.output_dir.join(format!(
            "{}-{year}-{month}.{}",
            R::FILE_PREFIX,
            format.extension()
        ))
    }

    /// Appends `events` to their monthly files. Returns the files that were rewritten.
    ///
    /// An empty slice touches nothing.
    pub fn append(&self, events: &[R], format: OutputFormat) -> ScoutResult<Vec<PathBuf>> {
        let groups = events
            .iter()
            .into_group_map_by(|event| {
                let t = event.event_time();
                (t.year(), t.month())
            })
            .into_iter()
            .sorted_by_key(|(month, _)| *month);

        let mut written = Vec::new();
        for ((year, month), group) in groups {
            let path = self.path_for(year, month, format);
            match format {
                OutputFormat::Csv => self.append_csv(&path, &group)?,
                OutputFormat::Json => self.append_json(&path, &group)?,
            }
            debug!(path = %path.display(), records = group.len(), "appended events");
            written.push(path);
        }
        Ok(written)
    }

    fn append_csv(&self, path: &Path, events: &[&R]) -> ScoutResult<()> {
        let existing = read_optional(path)?.unwrap_or_default();

        let mut out = String::with_capacity(existing.len() + 128 * events.len());
        out.push_str(R::CSV_HEADER);
        out.push('\n');
        // everything but the header row is kept as it was written
        for record in data_records::<R>(&existing) {
            out.push_str(record);
            out.push('\n');
        }
        for event in events {
            out.push_str(&encode_record(&event.to_csv_fields()));
            out.push('\n');
        }

        atomic_write(path, out.as_bytes()).map_err(|e| ScoutError::persistence(path, e))
    }

    fn append_json(&self, path: &Path, events: &[&R]) -> ScoutResult<()> {
        let mut file: EventFile<serde_json::Value> = match read_optional(path)? {
            None => EventFile::default(),
            Some(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), "unreadable event file, starting a new one: {e}");
                EventFile::default()
            }),
        };

        for event in events {
            let value = serde_json::to_value(event).map_err(|source| ScoutError::Serialization {
                what: "event",
                source,
            })?;
            file.events.push(value);
        }

        let text = serde_json::to_string_pretty(&file).map_err(|source| {
            ScoutError::Serialization {
                what: "event file",
                source,
            }
        })?;
        atomic_write(path, text.as_bytes()).map_err(|e| ScoutError::persistence(path, e))
    }

    /// Current records of one monthly file. Rows or objects that don't decode are
    /// skipped with a warning; a missing file reads as empty.
    pub fn read(&self, year: i32, month: u32, format: OutputFormat) -> ScoutResult<Vec<R>> {
        let path = self.path_for(year, month, format);
        let Some(text) = read_optional(&path)? else {
            return Ok(Vec::new());
        };

        let records = match format {
            OutputFormat::Csv => data_records::<R>(&text)
                .into_iter()
                .enumerate()
                .filter_map(|(idx, raw)| {
                    parse_record(raw)
                        .and_then(|fields| R::from_csv_fields(&fields))
                        .map_err(|e| warn!(path = %path.display(), row = idx + 1, "skipping malformed row: {e}"))
                        .ok()
                })
                .collect(),
            OutputFormat::Json => {
                let file: EventFile<serde_json::Value> =
                    serde_json::from_str(&text).map_err(|source| ScoutError::CorruptState {
                        path: path.clone(),
                        source,
                    })?;
                file.events
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idx, value)| {
                        serde_json::from_value(value)
                            .map_err(|e| warn!(path = %path.display(), index = idx, "skipping malformed event: {e}"))
                            .ok()
                    })
                    .collect()
            }
        };
        Ok(records)
    }
}

/// The rows of a CSV file without its header. A file written elsewhere may have no
/// header row, so the first row is only dropped when its first column is the
/// header's first column name.
fn data_records<R: EventRecord>(text: &str) -> Vec<&str> {
    let mut records = split_records(text);
    let first_column = R::CSV_HEADER.split(',').next().unwrap_or_default();
    let has_header = records.first().is_some_and(|first| {
        parse_record(first).is_ok_and(|fields| fields.first().is_some_and(|f| f == first_column))
    });
    if has_header {
        records.remove(0);
    }
    records
}

fn read_optional(path: &Path) -> ScoutResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ScoutError::persistence(path, e)),
    }
}

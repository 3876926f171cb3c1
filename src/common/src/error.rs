use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a metrics payload couldn't be turned into entity states.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetricsParseError {
    #[error("response body is not valid UTF-8")]
    Encoding,

    #[error("no metrics after parsing response")]
    Empty,
}

/// Failure of a single source during one collection pass.
///
/// These are recovered: the source is logged and left out of the current snapshot.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("collection deadline expired before {source_name} answered")]
    DeadlineExpired { source_name: String },

    #[error("failed to parse metrics: {0}")]
    Parse(#[from] MetricsParseError),

    #[error("fetch task for {source_name} did not complete: {reason}")]
    Task { source_name: String, reason: String },
}

impl CollectionError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CollectionError::Timeout { .. } | CollectionError::DeadlineExpired { .. }
        )
    }
}

/// Structural failures. Apart from `MalformedInput`, these abort the run.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("couldn't get metrics from any of the {attempted} sources during this run")]
    TotalCollectionFailure { attempted: usize },

    #[error("an instance is already running (lock held on {})", path.display())]
    LockHeld { path: PathBuf },

    #[error("persistence failure on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state in {}: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("couldn't serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed input in {context}: {detail}")]
    MalformedInput { context: String, detail: String },
}

impl ScoutError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScoutError::Persistence {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(context: impl Into<String>, detail: impl Into<String>) -> Self {
        ScoutError::MalformedInput {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Whether the run has to stop. Malformed input only ever skips a unit of work.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScoutError::MalformedInput { .. })
    }
}

pub type ScoutResult<T> = Result<T, ScoutError>;

use std::path::{Path, PathBuf};

use scout_common::{ScoutError, ScoutResult, StateSnapshot};
use tracing::debug;

use super::atomic::atomic_write;

/// The snapshot written by one run and read back as the former state by the next.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no run has saved a snapshot yet. A file that exists but can't be
    /// read or decoded is an error: it must not be silently replaced.
    pub fn load(&self) -> ScoutResult<Option<StateSnapshot>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved snapshot");
                return Ok(None);
            }
            Err(e) => return Err(ScoutError::persistence(&self.path, e)),
        };

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ScoutError::CorruptState {
                path: self.path.clone(),
                source,
            })
    }

    pub fn save(&self, snapshot: &StateSnapshot) -> ScoutResult<()> {
        let text = serde_json::to_string_pretty(snapshot).map_err(|source| {
            ScoutError::Serialization {
                what: "snapshot",
                source,
            }
        })?;
        atomic_write(&self.path, text.as_bytes())
            .map_err(|e| ScoutError::persistence(&self.path, e))?;
        debug!(path = %self.path.display(), sources = snapshot.metrics.len(), "saved snapshot");
        Ok(())
    }
}

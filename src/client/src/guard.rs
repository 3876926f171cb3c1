use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use scout_common::{ScoutError, ScoutResult};
use tracing::{debug, warn};

/// Exclusive, non-blocking `flock` on `<lock_dir>/<namespace>.lock`.
///
/// Held for as long as the guard lives; the lock is released when it is dropped.
pub struct SingleInstanceGuard {
    path: PathBuf,
    _lock: Flock<File>,
}

impl SingleInstanceGuard {
    pub fn acquire(lock_dir: &Path, namespace: &str) -> ScoutResult<Self> {
        fs::create_dir_all(lock_dir).map_err(|e| ScoutError::persistence(lock_dir, e))?;
        let path = lock_dir.join(format!("{namespace}.lock"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScoutError::persistence(&path, e))?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!(path = %path.display(), "acquired instance lock");
                Ok(SingleInstanceGuard { path, _lock: lock })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                warn!(path = %path.display(), "an instance is already running");
                Err(ScoutError::LockHeld { path })
            }
            Err((_, errno)) => Err(ScoutError::persistence(&path, std::io::Error::from(errno))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SingleInstanceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleInstanceGuard")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "releasing instance lock");
    }
}

//! Crash-safe per-file lock markers.
//!
//! A lock for message file `X` is the sidecar file `X.lock` next to it.
//! Creation with `create_new` is the exclusivity test itself — there is no
//! separate existence check to race against. A marker that survives a
//! crash is cleared by the next startup's reconciliation pass.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LockError;

/// Suffix appended to a message file's name to form its lock marker.
pub const LOCK_SUFFIX: &str = ".lock";

/// An acquired lock over one message file. Release is explicit; the
/// handle does not remove the marker on drop, so an in-flight marker
/// survives a crash and is visible to the next startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    source: PathBuf,
    lock: PathBuf,
}

impl LockHandle {
    /// The message file this lock claims.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The lock marker path.
    pub fn lock_path(&self) -> &Path {
        &self.lock
    }
}

/// Deterministic lock marker path for a message file: `X` -> `X.lock`.
pub fn lock_path_for(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Claim a message file by atomically creating its lock marker.
///
/// Fails with [`LockError::Duplicate`] when the marker already exists,
/// meaning another path (watcher event, backlog scan, or a prior unclean
/// shutdown) holds the claim.
pub fn acquire(file: &Path) -> Result<LockHandle, LockError> {
    let lock = lock_path_for(file);
    match OpenOptions::new().write(true).create_new(true).open(&lock) {
        Ok(_) => {
            debug!(lock = %lock.display(), "lock created");
            Ok(LockHandle {
                source: file.to_path_buf(),
                lock,
            })
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(LockError::Duplicate {
            file: file.to_path_buf(),
            lock,
        }),
        Err(e) => Err(LockError::Io(e)),
    }
}

/// Remove the lock marker for a processed message.
///
/// A marker that cannot be removed is logged and left behind; the next
/// startup's reconciliation clears it.
pub fn release(handle: LockHandle) {
    match std::fs::remove_file(handle.lock_path()) {
        Ok(()) => {
            debug!(
                lock = %handle.lock_path().display(),
                file = %handle.source().display(),
                "lock removed"
            );
        }
        Err(e) => {
            warn!(
                lock = %handle.lock_path().display(),
                file = %handle.source().display(),
                error = %e,
                "lock could not be removed"
            );
        }
    }
}

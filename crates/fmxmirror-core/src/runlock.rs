//! Run-level mutual exclusion.
//!
//! Reconciliation passes must not overlap: the ledger has no row locking,
//! and two concurrent passes could double-create remote events for the
//! same key. The lock file makes an overlapping invocation fail fast
//! instead.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

const LOCK_FILE: &str = "fmxmirror.lock";

#[derive(Debug, Error)]
pub enum RunLockError {
    #[error(
        "lock file {path} already exists (held by pid {pid}); another run may be in progress -- remove the file if that run crashed"
    )]
    Held { path: PathBuf, pid: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Held for the duration of one run; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock in `dir`, recording this process's pid.
    pub fn acquire_in(dir: &Path) -> Result<Self, RunLockError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                Err(RunLockError::Held {
                    path,
                    pid: if pid.is_empty() { "unknown".into() } else { pid },
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // best effort; a leftover lock surfaces with its pid on the next run
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire_in(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn second_acquire_fails_with_holder_pid() {
        let dir = TempDir::new().unwrap();
        let _held = RunLock::acquire_in(dir.path()).unwrap();

        match RunLock::acquire_in(dir.path()) {
            Err(RunLockError::Held { pid, .. }) => {
                assert_eq!(pid, std::process::id().to_string());
            }
            other => panic!("expected Held, got {other:?}"),
        }
    }

    #[test]
    fn lock_can_be_reacquired_after_release() {
        let dir = TempDir::new().unwrap();
        drop(RunLock::acquire_in(dir.path()).unwrap());
        RunLock::acquire_in(dir.path()).unwrap();
    }
}

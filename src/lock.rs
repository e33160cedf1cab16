//! Advisory locking of a backup directory
//!
//! Mutating operations hold an exclusive lock on the directory's lock file
//! and fail fast when another holder exists. Read-only operations take a
//! shared lock, which waits for any exclusive holder to finish. Locks are
//! released when the guard is dropped.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{SnapvaultError, SnapvaultResult};

/// Held lock on a backup directory
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
    exclusive: bool,
}

impl DirLock {
    /// Take the exclusive lock, or fail with `Busy` if anyone holds it
    pub fn exclusive(path: &Path) -> SnapvaultResult<Self> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "Acquired exclusive lock");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    exclusive: true,
                })
            }
            Err(e) if is_contended(&e) => Err(SnapvaultError::Busy(format!(
                "another operation holds {}",
                path.display()
            ))),
            Err(e) => Err(SnapvaultError::Io(format!(
                "Failed to lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Take a shared lock, waiting while an exclusive holder exists
    pub fn shared(path: &Path) -> SnapvaultResult<Self> {
        let file = open_lock_file(path)?;
        file.lock_shared().map_err(|e| {
            SnapvaultError::Io(format!("Failed to lock {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Acquired shared lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            exclusive: false,
        })
    }

    /// Whether this guard holds the exclusive lock
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "Released lock");
    }
}

fn open_lock_file(path: &Path) -> SnapvaultResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            SnapvaultError::Io(format!("Failed to open lock file {}: {}", path.display(), e))
        })
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let guard = DirLock::exclusive(&path).unwrap();
        assert!(guard.is_exclusive());

        let err = DirLock::exclusive(&path).unwrap_err();
        assert!(err.is_busy());

        drop(guard);
        assert!(DirLock::exclusive(&path).is_ok());
    }

    #[test]
    fn test_shared_locks_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let first = DirLock::shared(&path).unwrap();
        let second = DirLock::shared(&path).unwrap();
        assert!(!first.is_exclusive());

        // Writers are turned away while readers hold the directory
        assert!(DirLock::exclusive(&path).unwrap_err().is_busy());
        drop(first);
        drop(second);
        assert!(DirLock::exclusive(&path).is_ok());
    }

    #[test]
    fn test_shared_waits_for_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let guard = DirLock::exclusive(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        let reader_path = path.clone();
        let reader = std::thread::spawn(move || {
            let _shared = DirLock::shared(&reader_path).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        reader.join().unwrap();
    }
}

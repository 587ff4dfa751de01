//! Per-target deployment lock.
//!
//! Two deployments to the same target from this machine would race on the
//! same checkout and process slot. The lock is an exclusive OS file lock on
//! `<target_key>.lock`, so it is released when the holder exits, however it
//! exits. The file itself stays in place and records the holder's PID for
//! error messages; its content never decides who holds the lock.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "another deployment to this target is running ({}, lock {})",
        describe_owner(.pid),
        .path.display()
    )]
    Held { pid: Option<u32>, path: PathBuf },

    #[error("failed to manage deployment lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn describe_owner(pid: &Option<u32>) -> String {
    match pid {
        Some(pid) => format!("pid {}", pid),
        None => "pid unknown".to_string(),
    }
}

/// Held lock; released when dropped or when the process ends.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    file: File,
}

impl DeployLock {
    pub fn acquire(lock_dir: &Path, target_key: &str) -> Result<Self, LockError> {
        fs::create_dir_all(lock_dir).map_err(|source| LockError::Io {
            path: lock_dir.to_path_buf(),
            source,
        })?;
        let path = lock_dir.join(format!("{}.lock", target_key));
        let io_err = |source: io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        // no truncate: the current holder's PID must survive until we own the lock
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(LockError::Held {
                    pid: read_owner(&path),
                    path: path.clone(),
                });
            }
            Err(TryLockError::Error(err)) => return Err(io_err(err)),
        }

        file.set_len(0)
            .and_then(|_| file.rewind())
            .and_then(|_| write!(file, "{}", std::process::id()))
            .and_then(|_| file.flush())
            .map_err(io_err)?;
        tracing::debug!(path = %path.display(), "deployment lock acquired");

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        // clear the PID while still holding the lock
        let _ = self.file.set_len(0);
        if let Err(err) = self.file.unlock() {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to release deployment lock"
            );
        }
        tracing::debug!(path = %self.path.display(), "deployment lock released");
    }
}

fn read_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use tempfile::TempDir;

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let temp = TempDir::new().unwrap();

        let lock = DeployLock::acquire(temp.path(), "target").unwrap();
        assert!(lock.path().exists());

        let err = DeployLock::acquire(temp.path(), "target").unwrap_err();
        assert!(matches!(
            err,
            LockError::Held { pid: Some(pid), .. } if pid == std::process::id()
        ));

        drop(lock);
        assert!(DeployLock::acquire(temp.path(), "target").is_ok());
    }

    #[test]
    fn different_targets_do_not_conflict() {
        let temp = TempDir::new().unwrap();
        let _a = DeployLock::acquire(temp.path(), "a").unwrap();
        assert!(DeployLock::acquire(temp.path(), "b").is_ok());
    }

    #[test]
    fn leftover_lock_file_is_reused() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("target.lock"), "4194305").unwrap();

        let lock = DeployLock::acquire(temp.path(), "target").unwrap();
        let owner = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner, std::process::id().to_string());
    }

    #[test]
    fn empty_lock_file_of_live_holder_still_blocks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("target.lock");
        let holder = File::create(&path).unwrap();
        holder.lock().unwrap();

        let err = DeployLock::acquire(temp.path(), "target").unwrap_err();
        assert!(matches!(err, LockError::Held { pid: None, .. }));
        assert!(err.to_string().contains("pid unknown"));
    }

    #[test]
    fn concurrent_acquirers_never_share_the_lock() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();
        let holders = Arc::new(AtomicUsize::new(0));
        let max_holders = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let dir = dir.clone();
                    let barrier = Arc::clone(&barrier);
                    let holders = Arc::clone(&holders);
                    let max_holders = Arc::clone(&max_holders);
                    std::thread::spawn(move || {
                        barrier.wait();
                        if let Ok(lock) = DeployLock::acquire(&dir, "target") {
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            max_holders.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(1));
                            holders.fetch_sub(1, Ordering::SeqCst);
                            drop(lock);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        }

        assert_eq!(max_holders.load(Ordering::SeqCst), 1);
    }
}

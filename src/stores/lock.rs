//! Advisory run lock for one archive root.
//!
//! The lock file is created with `create_new` and records the owning pid. A lock
//! whose pid no longer exists (or whose content is unreadable) is moved aside and
//! taken over.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::errors::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at_rfc3339: String,
    operation: String,
}

/// Held for the duration of a batch; removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    released: bool,
}

impl RunLock {
    /// Take the lock at `path` for `operation`.
    ///
    /// A lock held by a live process is `StoreLocked`; a stale or unreadable one
    /// is moved aside and taken over.
    pub fn acquire(path: &Path, operation: &str) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            let contents = fs::read_to_string(path)?;
            match serde_json::from_str::<LockInfo>(&contents) {
                Ok(info) if pid_is_alive(info.pid) => {
                    return Err(PipelineError::StoreLocked(format!(
                        "held by pid {} ({}) since {}; remove {} if that process is gone",
                        info.pid,
                        info.operation,
                        info.created_at_rfc3339,
                        path.display()
                    )));
                }
                Ok(info) => {
                    warn!(pid = info.pid, "[videos:lock] taking over stale lock");
                    archive_stale_lock(path, "stale")?;
                }
                Err(_) => {
                    warn!("[videos:lock] taking over unreadable lock");
                    archive_stale_lock(path, "corrupt")?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            created_at_rfc3339: Utc::now().to_rfc3339(),
            operation: operation.to_owned(),
        };
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .map_err(|err| {
                PipelineError::StoreLocked(format!("failed to create {}: {err}", path.display()))
            })?;
        let body = serde_json::to_string_pretty(&info)
            .map_err(|err| PipelineError::StoreLocked(err.to_string()))?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Remove the lock file now instead of on drop.
    pub fn release(mut self) -> Result<(), PipelineError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), PipelineError> {
        if self.released {
            return Ok(());
        }
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.released = true;
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release_inner();
        }
    }
}

fn archive_stale_lock(path: &Path, reason: &str) -> Result<(), PipelineError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archived = path.with_file_name(format!(
        "{file_name}.{reason}.{}.json",
        Utc::now().timestamp_millis()
    ));
    fs::rename(path, archived)?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locks/pipeline.lock");
        let lock = RunLock::acquire(&path, "batch").unwrap();
        let err = RunLock::acquire(&path, "batch").unwrap_err();
        assert!(matches!(err, PipelineError::StoreLocked(_)));
        lock.release().unwrap();
        assert!(!path.exists());
        let _again = RunLock::acquire(&path, "batch").unwrap();
    }

    #[test]
    fn corrupt_lock_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.lock");
        fs::write(&path, "garbage").unwrap();
        {
            let _lock = RunLock::acquire(&path, "batch").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        let archived = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".corrupt."))
            .count();
        assert_eq!(archived, 1);
    }
}

// ABOUTME: Deploy lock to prevent concurrent deployments to the same project.
// ABOUTME: Uses atomic file creation with lock info stored in <project>/.horsestrap/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diagnostics::{Diagnostics, Warning};

use super::DeployError;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Project directory being deployed.
    pub project: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(project: &Path) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            project: project.display().to_string(),
        }
    }

    /// Check if this lock is older than `stale_after`.
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        let age = Utc::now() - self.started_at;
        age.to_std().map(|age| age >= stale_after).unwrap_or(false)
    }

    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// A held deploy lock that releases on drop.
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
    released: bool,
}

impl DeployLock {
    /// Acquire the lock at `path` for `project`.
    ///
    /// The lock appears on disk already filled in (hard link from a staged
    /// file), so two processes can never both succeed. Locks older than
    /// `stale_after` are broken with a warning, and `force` breaks an active
    /// one. An unreadable lock counts as held until it is stale.
    pub fn acquire(
        path: &Path,
        project: &Path,
        stale_after: Duration,
        force: bool,
        diag: &mut Diagnostics,
    ) -> Result<Self, DeployError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeployError::lock_error(format!("failed to create state directory: {}", e))
            })?;
        }

        let info = LockInfo::new(project);
        if Self::try_create(path, &info)? {
            return Ok(Self::held(path));
        }

        match LockInfo::read(path) {
            Some(existing) if force => diag.warn(Warning::stale_lock(format!(
                "breaking lock held by {} (pid {}) since {}",
                existing.holder, existing.pid, existing.started_at
            ))),
            Some(existing) if existing.is_stale(stale_after) => {
                diag.warn(Warning::stale_lock(format!(
                    "auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder, existing.pid, existing.started_at
                )))
            }
            Some(existing) => {
                return Err(DeployError::ConcurrentDeployment {
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            None => match lock_age(path) {
                // Released between our create attempt and the read.
                None => {}
                // Unreadable but recent: treat it as held.
                Some(age) if age < stale_after && !force => {
                    let age = chrono::Duration::from_std(age)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    return Err(DeployError::ConcurrentDeployment {
                        holder: "unknown".to_string(),
                        pid: 0,
                        started_at: Utc::now() - age,
                    });
                }
                Some(_) => diag.warn(Warning::stale_lock(format!(
                    "lock info at {} unreadable, breaking lock",
                    path.display()
                ))),
            },
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to break lock: {}",
                    e
                )));
            }
        }

        if Self::try_create(path, &info)? {
            Ok(Self::held(path))
        } else {
            Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ))
        }
    }

    fn held(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            released: false,
        }
    }

    /// Returns false when the lock file already exists.
    ///
    /// The info is written to a private temp file first and hard-linked onto
    /// `path`, so the lock never exists without its contents.
    fn try_create(path: &Path, info: &LockInfo) -> Result<bool, DeployError> {
        let json = serde_json::to_string(info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        let tmp = staging_path(path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| DeployError::lock_error(format!("failed to stage lock: {}", e)))?;
        let written = file.write_all(json.as_bytes()).and_then(|()| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(DeployError::lock_error(format!(
                "failed to write lock info: {}",
                e
            )));
        }

        let linked = std::fs::hard_link(&tmp, path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to acquire lock: {}",
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), DeployError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to release lock: {}",
                e
            ))),
        }
    }
}

/// Per-process staging file next to the lock.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deploy.lock".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Time since the lock file was last written.
fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.elapsed().unwrap_or_default())
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

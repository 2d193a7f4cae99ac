//! # Checkpoint Files
//!
//! Pipeline checkpoints are JSON files (`.fcp`) written so that a crash or a
//! second process can never leave a half-written state behind:
//!
//! - **Atomic saves**: write `<name>.fcp.tmp`, fsync, rename over the target
//! - **Locking**: an OS lock (fs2) plus a `<name>.fcp.lock` file naming the
//!   holder, so a resumed run refuses to clobber a checkpoint in use
//! - **Version check**: the schema version is validated on load
//!
//! ## Example
//!
//! ```rust,no_run
//! use frame_core::config::DesignConfig;
//! use frame_core::file_io::{load_checkpoint, save_checkpoint, CheckpointLock};
//! use frame_core::model::StructuralModel;
//! use frame_core::pipeline::Checkpoint;
//! use std::path::Path;
//!
//! let path = Path::new("tower.fcp");
//! let checkpoint = Checkpoint::new(StructuralModel::new(), DesignConfig::default());
//!
//! let lock = CheckpointLock::acquire(path, "designer")?;
//! save_checkpoint(&checkpoint, path)?;
//! drop(lock);
//!
//! let resumed = load_checkpoint(path)?;
//! assert_eq!(resumed.meta.run_id, checkpoint.meta.run_id);
//! # Ok::<(), frame_core::errors::DesignError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{DesignError, DesignResult};
use crate::pipeline::{Checkpoint, SCHEMA_VERSION};

/// Conventional checkpoint extension
pub const CHECKPOINT_EXTENSION: &str = "fcp";

/// Who holds a checkpoint lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(holder: impl Into<String>) -> Self {
        LockInfo {
            holder: holder.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME").ok().or_else(|| std::env::var("HOST").ok())
    }
}

/// Exclusive checkpoint lock; released on drop.
pub struct CheckpointLock {
    checkpoint_path: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl CheckpointLock {
    /// Take the lock, failing with `FileLocked` when a live holder exists.
    ///
    /// A lock left by a dead process on this machine, or older than a day,
    /// is taken over.
    pub fn acquire(path: &Path, holder: impl Into<String>) -> DesignResult<Self> {
        let lock_path = lock_path_for(path);
        let info = LockInfo::new(holder);

        if let Ok(existing) = read_lock_info(&lock_path) {
            if !is_lock_stale(&existing) {
                return Err(DesignError::file_locked(
                    path.display().to_string(),
                    format!("{} ({})", existing.holder, existing.machine),
                    existing.locked_at.to_rfc3339(),
                ));
            }
            debug!(path = %lock_path.display(), holder = %existing.holder, "Taking over stale lock");
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| DesignError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| DesignError::file_locked(path.display().to_string(), "another process", "unknown"))?;

        let json = serde_json::to_string_pretty(&info)?;
        lock_file
            .write_all(json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| DesignError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        Ok(CheckpointLock {
            checkpoint_path: path.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current live holder of a checkpoint, if any
    pub fn check(path: &Path) -> Option<LockInfo> {
        read_lock_info(&lock_path_for(path)).ok().filter(|info| !is_lock_stale(info))
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }
}

impl Drop for CheckpointLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// `run.fcp` → `run.fcp.lock`
fn lock_path_for(path: &Path) -> PathBuf {
    with_suffix(path, "lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    let extension = out
        .extension()
        .map(|e| format!("{}.{}", e.to_string_lossy(), suffix))
        .unwrap_or_else(|| suffix.to_string());
    out.set_extension(extension);
    out
}

fn read_lock_info(lock_path: &Path) -> DesignResult<LockInfo> {
    let mut contents = String::new();
    File::open(lock_path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| DesignError::file_error("read lock", lock_path.display().to_string(), e.to_string()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn is_lock_stale(info: &LockInfo) -> bool {
    if hostname().is_some_and(|h| h == info.machine) {
        #[cfg(unix)]
        {
            if fs::metadata(format!("/proc/{}", info.pid)).is_err() {
                return true;
            }
        }
    }
    (Utc::now() - info.locked_at).num_hours() > 24
}

/// Write a checkpoint atomically.
pub fn save_checkpoint(checkpoint: &Checkpoint, path: &Path) -> DesignResult<()> {
    let json = serde_json::to_string_pretty(checkpoint)?;
    let tmp_path = with_suffix(path, "tmp");

    let mut tmp = File::create(&tmp_path)
        .map_err(|e| DesignError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.sync_all())
        .map_err(|e| DesignError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DesignError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    debug!(path = %path.display(), stage = %checkpoint.stage(), "Checkpoint saved");
    Ok(())
}

/// Read a checkpoint and check its schema version.
pub fn load_checkpoint(path: &Path) -> DesignResult<Checkpoint> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;

    let checkpoint: Checkpoint = serde_json::from_str(&contents).map_err(|e| DesignError::SerializationError {
        reason: format!("Invalid checkpoint {}: {}", path.display(), e),
    })?;
    validate_version(&checkpoint.meta.version)?;
    Ok(checkpoint)
}

/// Load a checkpoint together with any live lock on it.
pub fn load_checkpoint_with_lock_check(path: &Path) -> DesignResult<(Checkpoint, Option<LockInfo>)> {
    let checkpoint = load_checkpoint(path)?;
    Ok((checkpoint, CheckpointLock::check(path)))
}

/// Major must match; under 0.x a newer minor is rejected too.
fn validate_version(file_version: &str) -> DesignResult<()> {
    let parse = |v: &str| v.split('.').filter_map(|p| p.parse::<u32>().ok()).collect::<Vec<_>>();
    let file = parse(file_version);
    let current = parse(SCHEMA_VERSION);
    let mismatch = || DesignError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    match (file.as_slice(), current.as_slice()) {
        ([fmaj, rest @ ..], [cmaj, crest @ ..]) => {
            if fmaj != cmaj {
                return Err(mismatch());
            }
            if *cmaj == 0 {
                if let (Some(fmin), Some(cmin)) = (rest.first(), crest.first()) {
                    if fmin > cmin {
                        return Err(mismatch());
                    }
                }
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesignConfig;
    use crate::model::{Point3, StructuralModel};
    use tempfile::TempDir;

    fn checkpoint() -> Checkpoint {
        let mut model = StructuralModel::new();
        model.add_joint("A", Point3::new(0.0, 0.0, 0.0)).unwrap();
        model.add_joint("B", Point3::new(0.0, 0.0, 10.0)).unwrap();
        model.add_frame("C1", "A", "B").unwrap();
        Checkpoint::new(model, DesignConfig::default())
    }

    #[test]
    fn test_suffix_paths() {
        assert_eq!(lock_path_for(Path::new("/runs/a.fcp")), Path::new("/runs/a.fcp.lock"));
        assert_eq!(with_suffix(Path::new("/runs/a.fcp"), "tmp"), Path::new("/runs/a.fcp.tmp"));
        assert_eq!(lock_path_for(Path::new("/runs/a")), Path::new("/runs/a.lock"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.fcp");
        let original = checkpoint();
        save_checkpoint(&original, &path).unwrap();
        assert!(!with_suffix(&path, "tmp").exists());

        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_lock_blocks_second_holder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.fcp");
        let lock = CheckpointLock::acquire(&path, "first").unwrap();
        assert_eq!(lock.info.holder, "first");
        assert!(lock_path_for(&path).exists());

        let held = CheckpointLock::check(&path);
        assert!(held.is_some_and(|info| info.holder == "first"));

        drop(lock);
        assert!(!lock_path_for(&path).exists());
        assert!(CheckpointLock::check(&path).is_none());
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.1.7").is_ok());
        assert!(validate_version("0.0.3").is_ok());
        assert!(validate_version("0.2.0").is_err());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("garbage").is_err());
    }

    #[test]
    fn test_newer_checkpoint_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.fcp");
        let mut cp = checkpoint();
        cp.meta.version = "0.9.0".into();
        save_checkpoint(&cp, &path).unwrap();
        let err = load_checkpoint(&path).unwrap_err();
        assert_eq!(err.error_code(), "VERSION_MISMATCH");
    }

    #[test]
    fn test_load_reports_live_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.fcp");
        save_checkpoint(&checkpoint(), &path).unwrap();

        let (_, lock) = load_checkpoint_with_lock_check(&path).unwrap();
        assert!(lock.is_none());

        let _held = CheckpointLock::acquire(&path, "designer").unwrap();
        let (_, lock) = load_checkpoint_with_lock_check(&path).unwrap();
        assert!(lock.is_some_and(|info| info.holder == "designer"));
    }
}

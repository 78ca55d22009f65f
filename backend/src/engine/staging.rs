//! Durable storage for uploaded import files between the check and execute
//! stages.
//!
//! A staged file is addressed by an opaque handle of the form
//! `import_<uuid>.csv`. Execution claims the handle by renaming the file to a
//! private name; `rename` is atomic, so when two callers race for the same
//! handle exactly one of them wins and the other observes it as gone. The
//! claimed file is removed when the claim is dropped, whatever the outcome
//! of the import.

use crate::engine::error::ImportError;
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use uuid::Uuid;

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^import_[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.csv$")
        .expect("handle regex")
});

const CLAIMED_SUFFIX: &str = ".claimed";

/// Where a handle stands in the import lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    /// Uploaded and checked, waiting to be executed.
    Staged(PathBuf),
    /// Claimed by an execution that is running or has not cleaned up yet.
    Consumed,
    /// Unknown, malformed, executed or older than the staging TTL.
    Expired,
}

#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    ttl: Duration,
}

/// A file that was just persisted under a fresh handle.
#[derive(Debug)]
pub struct StagedImport {
    pub handle: String,
    pub path: PathBuf,
}

/// Exclusive ownership of a staged file; deletes it on drop.
#[derive(Debug)]
pub struct ClaimedImport {
    handle: String,
    path: PathBuf,
}

impl ClaimedImport {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl Drop for ClaimedImport {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove claimed import {}: {}", self.path.display(), e);
            }
        }
    }
}

impl StagingArea {
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(StagingArea { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A scratch file inside the staging directory to stream an upload into.
    pub fn new_upload(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(".upload_")
            .suffix(".part")
            .tempfile_in(&self.dir)
    }

    /// Publishes a fully written upload under a new handle.
    pub fn persist(&self, upload: NamedTempFile) -> Result<StagedImport, ImportError> {
        let handle = format!("import_{}.csv", Uuid::new_v4());
        let path = self.dir.join(&handle);
        upload
            .persist_noclobber(&path)
            .map_err(|e| ImportError::Upload(format!("Could not save temp file: {}", e.error)))?;
        debug!("Staged import {}", handle);
        Ok(StagedImport { handle, path })
    }

    pub fn state(&self, handle: &str) -> HandleState {
        if !HANDLE_RE.is_match(handle) {
            return HandleState::Expired;
        }
        let path = self.dir.join(handle);
        match fs::metadata(&path) {
            Ok(meta) if self.is_stale(meta.modified().ok()) => HandleState::Expired,
            Ok(_) => HandleState::Staged(path),
            Err(_) if self.claimed_path(handle).exists() => HandleState::Consumed,
            Err(_) => HandleState::Expired,
        }
    }

    /// Takes exclusive ownership of a staged file.
    pub fn claim(&self, handle: &str) -> Result<ClaimedImport, ImportError> {
        let source = match self.state(handle) {
            HandleState::Staged(path) => path,
            HandleState::Consumed => {
                info!("Import {} was already claimed", handle);
                return Err(ImportError::Expired);
            }
            HandleState::Expired => {
                self.discard(handle);
                return Err(ImportError::Expired);
            }
        };
        let claimed = self.claimed_path(handle);
        match fs::rename(&source, &claimed) {
            Ok(()) => Ok(ClaimedImport {
                handle: handle.to_string(),
                path: claimed,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ImportError::Expired),
            Err(e) => Err(ImportError::Unreadable(e.to_string())),
        }
    }

    /// Removes a staged file, if the handle is well formed and present.
    pub fn discard(&self, handle: &str) {
        if !HANDLE_RE.is_match(handle) {
            return;
        }
        match fs::remove_file(self.dir.join(handle)) {
            Ok(()) => debug!("Discarded staged import {}", handle),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not discard staged import {}: {}", handle, e),
        }
    }

    /// Deletes staged and claimed files older than the TTL. Returns how many
    /// files were removed.
    pub fn sweep_expired(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan staging directory {}: {}", self.dir.display(), e);
                return 0;
            }
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let base = name.strip_suffix(CLAIMED_SUFFIX).unwrap_or(&name);
            if !HANDLE_RE.is_match(base) {
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            if self.is_stale(modified) && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} expired staged import(s)", removed);
        }
        removed
    }

    fn claimed_path(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{}{}", handle, CLAIMED_SUFFIX))
    }

    fn is_stale(&self, modified: Option<SystemTime>) -> bool {
        modified
            .and_then(|m| m.elapsed().ok())
            .is_some_and(|age| age > self.ttl)
    }
}

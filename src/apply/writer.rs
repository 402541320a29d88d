//! Crash-safe replacement of the configuration artifact.
//!
//! # Responsibilities
//! - Stage the full text in an exclusive temp file next to the target
//! - fsync before the rename so a reload never reads a partial file
//! - Leave the target untouched on any failure before the rename
//!
//! Atomicity is achieved via:
//! 1. Write to temp file in the target directory (same filesystem)
//! 2. fsync temp file
//! 3. Rename temp over target
//! 4. fsync the directory so the rename itself is durable

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{LbaasError, LbaasResult};

/// Writes whole files by rename.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    path: PathBuf,
}

impl AtomicWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to a temp file beside the target without touching it.
    ///
    /// The returned guard removes the temp file when dropped uncommitted.
    pub fn stage(&self, contents: &str) -> LbaasResult<StagedConfig> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let prefix = format!(
            ".{}.",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "artifact".to_string())
        );

        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| self.write_error(e))?;

        // Keep the mode of the file we are replacing.
        if let Ok(meta) = fs::metadata(&self.path) {
            if meta.is_file() {
                tmp.as_file()
                    .set_permissions(meta.permissions())
                    .map_err(|e| self.write_error(e))?;
            }
        }

        tmp.write_all(contents.as_bytes())
            .map_err(|e| self.write_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;

        tracing::debug!(
            target_path = %self.path.display(),
            temp_path = %tmp.path().display(),
            bytes = contents.len(),
            "Staged artifact"
        );

        Ok(StagedConfig {
            tmp,
            target: self.path.clone(),
        })
    }

    /// Stage and commit in one step.
    pub fn write(&self, contents: &str) -> LbaasResult<()> {
        self.stage(contents)?.commit()
    }

    fn write_error(&self, source: std::io::Error) -> LbaasError {
        LbaasError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// A fully written and synced temp file waiting to replace its target.
#[derive(Debug)]
pub struct StagedConfig {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedConfig {
    /// Location of the staged temp file.
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Atomically rename the staged file over the target.
    pub fn commit(self) -> LbaasResult<()> {
        let target = self.target;
        // On failure the returned temp file handle is dropped and deleted.
        self.tmp.persist(&target).map_err(|e| LbaasError::Write {
            path: target.clone(),
            source: e.error,
        })?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        tracing::debug!(path = %target.display(), "Artifact replaced");
        Ok(())
    }
}

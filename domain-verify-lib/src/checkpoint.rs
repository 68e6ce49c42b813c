//! Crash-recovery checkpoints.
//!
//! The orchestrator overwrites a single JSON file as a batch makes progress.
//! Nothing in the library reads it back on its own; it exists so an operator
//! can see what a killed run had already found.

use crate::error::DomainVerifyError;
use crate::types::{CheckResult, Checkpoint};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes the checkpoint file at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the checkpoint with the current progress.
    pub fn save(
        &self,
        checked_count: usize,
        available: &[CheckResult],
    ) -> Result<Checkpoint, DomainVerifyError> {
        let checkpoint = Checkpoint {
            timestamp: Utc::now(),
            checked_count,
            available_count: available.len(),
            available_domains: available.to_vec(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                DomainVerifyError::file_error(parent.to_string_lossy(), e.to_string())
            })?;
        }

        let json = serde_json::to_string_pretty(&checkpoint)?;
        fs::write(&self.path, json).map_err(|e| {
            DomainVerifyError::file_error(self.path.to_string_lossy(), e.to_string())
        })?;

        debug!(
            path = %self.path.display(),
            checked = checked_count,
            available = checkpoint.available_count,
            "checkpoint written"
        );
        Ok(checkpoint)
    }

    /// Read the last checkpoint, if one exists.
    pub fn load(&self) -> Result<Option<Checkpoint>, DomainVerifyError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainVerifyError::file_error(
                    self.path.to_string_lossy(),
                    e.to_string(),
                ))
            }
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Delete the checkpoint file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool, DomainVerifyError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainVerifyError::file_error(
                self.path.to_string_lossy(),
                e.to_string(),
            )),
        }
    }
}

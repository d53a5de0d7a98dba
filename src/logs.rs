//! Per-run log directory holding one log file per repository.
use std::fs::{create_dir_all, remove_dir_all};
use std::path::{Path, PathBuf};

use crate::errors::{DroverError, DroverErrorKind};

/// Log directory for one run, recreated (old contents removed) at start.
#[derive(Debug, Clone)]
pub struct RunLogs {
    /// Directory holding the per-repository log files.
    dir: PathBuf,
}

impl RunLogs {
    /// Recreate the log directory `name` under `parent`.
    pub fn create(parent: &Path, name: &str) -> Result<Self, DroverError> {
        let dir = parent.join(name);
        if dir.is_dir() {
            remove_dir_all(&dir)
                .map_err(|e| {
                    DroverError::new_with_source(DroverErrorKind::Io, "unable to clear log dir", e)
                })?;
        }
        create_dir_all(&dir)
            .map_err(|e| {
                DroverError::new_with_source(DroverErrorKind::Io, "unable to create log dir", e)
            })?;
        Ok(Self { dir })
    }

    /// Log file for one repository.
    pub fn path_for(&self, repo_name: &str) -> PathBuf {
        self.dir.join(format!("{repo_name}.log"))
    }

    /// The log directory itself.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

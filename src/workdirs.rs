//! Working directory provisioning.
//!
//! SYSTEM CONTEXT
//! ==============
//! Audio collaborators stage files under a fixed set of underscore-prefixed
//! directories. Startup creates them before the listener is bound and checks
//! they are writable; a directory the server cannot write aborts startup.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Directory names, relative to the data root.
pub const WORKING_DIRS: [&str; 4] = ["_temp", "_samples", "_segments", "_speech_profiles"];

const WRITE_PROBE: &str = ".write-probe";

#[derive(Debug, thiserror::Error)]
pub enum WorkdirError {
    #[error("{} exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to create {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("{} is not writable: {source}", .path.display())]
    NotWritable { path: PathBuf, source: io::Error },
}

/// Outcome of a provisioning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
}

/// The fixed working directories under one data root.
#[derive(Debug, Clone)]
pub struct WorkingDirs {
    root: PathBuf,
}

impl WorkingDirs {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn temp(&self) -> PathBuf {
        self.root.join(WORKING_DIRS[0])
    }

    #[must_use]
    pub fn samples(&self) -> PathBuf {
        self.root.join(WORKING_DIRS[1])
    }

    #[must_use]
    pub fn segments(&self) -> PathBuf {
        self.root.join(WORKING_DIRS[2])
    }

    #[must_use]
    pub fn speech_profiles(&self) -> PathBuf {
        self.root.join(WORKING_DIRS[3])
    }

    /// All working directory paths in declaration order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        WORKING_DIRS.iter().map(|name| self.root.join(name)).collect()
    }

    /// Create every missing directory (with parents) and verify each one is
    /// writable. Directories that already exist are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a path is occupied by a non-directory, cannot be
    /// created, or cannot be written to.
    pub fn provision(&self) -> Result<ProvisionReport, WorkdirError> {
        let mut report = ProvisionReport::default();

        for path in self.paths() {
            if path.is_dir() {
                debug!(path = %path.display(), "working directory present");
                report.existing.push(path);
                continue;
            }
            if path.exists() {
                return Err(WorkdirError::NotADirectory(path));
            }
            std::fs::create_dir_all(&path).map_err(|source| WorkdirError::Create { path: path.clone(), source })?;
            report.created.push(path);
        }

        for path in self.paths() {
            probe_writable(&path)?;
        }

        info!(
            root = %self.root.display(),
            created = report.created.len(),
            existing = report.existing.len(),
            "working directories ready"
        );
        Ok(report)
    }
}

fn probe_writable(dir: &Path) -> Result<(), WorkdirError> {
    let probe = dir.join(WRITE_PROBE);
    std::fs::write(&probe, b"")
        .and_then(|()| std::fs::remove_file(&probe))
        .map_err(|source| WorkdirError::NotWritable { path: dir.to_path_buf(), source })
}

#[cfg(test)]
#[path = "workdirs_test.rs"]
mod tests;

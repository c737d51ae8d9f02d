//! # Cleanup Registry
//!
//! Tracks the working directories created during a run and guarantees their
//! removal. A directory is registered right after it is created, before any
//! fallible operation touches it, so a task that fails half-way through a
//! checkout still has its directory removed.
//!
//! Removal is idempotent: paths that no longer exist are skipped, and a
//! second [`CleanupRegistry::cleanup`] call finds nothing left to do. The
//! registry also cleans up when dropped, which covers early returns and
//! unwinding panics.
//!
//! Cleanup failures are logged and returned for inspection but never turned
//! into the primary error of a run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Error;

/// The set of directories a run has to remove before it ends.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    paths: Vec<PathBuf>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` for removal. Registering the same path twice keeps a
    /// single entry.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            debug!("registered {} for cleanup", path.display());
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Removes one registered path right away and forgets it.
    ///
    /// Paths that were never registered are left alone.
    pub fn release(&mut self, path: &Path) -> Option<Error> {
        let index = self.paths.iter().position(|p| p == path)?;
        let path = self.paths.remove(index);
        remove_if_present(&path).err()
    }

    /// Removes every registered path and its contents, in registration order.
    ///
    /// Returns the failures, which have already been logged.
    pub fn cleanup(&mut self) -> Vec<Error> {
        self.paths
            .drain(..)
            .filter_map(|path| remove_if_present(&path).err())
            .collect()
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_if_present(path: &Path) -> Result<(), Error> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            debug!("removed {}", path.display());
            Ok(())
        }
        // Something else removed it in the meantime
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!("failed to remove {}: {}", path.display(), e);
            Err(Error::Cleanup {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

//! Fetching Sources
//!
//! Creates a task's working directory and checks the repository out into it.
//!
//! ## Process
//!
//! 1.  **Prepare**: The output directory is created if needed. A working
//!     directory left behind by an earlier, interrupted run is removed, then
//!     a fresh empty one is created and registered for cleanup straight
//!     away, before anything can fail inside it.
//!
//! 2.  **Checkout**: The task's backend populates the working directory with
//!     the pinned revision, or the latest one.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::cleanup::CleanupRegistry;
use crate::error::{Error, Result};
use crate::scm::ScmBackend;
use crate::task::Task;

/// Creates an empty working directory for `task` and registers it.
pub fn prepare_workdir(task: &Task, registry: &mut CleanupRegistry) -> Result<PathBuf> {
    fs::create_dir_all(&task.outdir).map_err(|e| {
        Error::packaging(format!(
            "Failed to create output directory '{}': {}",
            task.outdir.display(),
            e
        ))
    })?;

    let workdir = task.workdir();
    if workdir.exists() {
        debug!("removing stale working directory {}", workdir.display());
        fs::remove_dir_all(&workdir)?;
    }

    fs::create_dir(&workdir)?;
    registry.register(&workdir);
    Ok(workdir)
}

/// Checks `task` out into `workdir`.
pub fn execute(backend: &dyn ScmBackend, task: &Task, workdir: &Path) -> Result<()> {
    info!(
        "{}: fetching {} ({}{})",
        task.filename,
        task.url,
        task.scm,
        task.revision
            .as_deref()
            .map(|r| format!(" @ {}", r))
            .unwrap_or_default()
    );
    backend.fetch(&task.url, task.revision.as_deref(), workdir)
}

//! Orchestrator for a complete tar-scm run
//!
//! Drives every task of a [`TaskList`] through its phases and ties the
//! results together:
//!
//! 1. Order the tasks so dependencies run first
//! 2. Per task: prepare the working directory, fetch, compute the version,
//!    write the archive and its metadata
//! 3. Write the composite manifest, if every task succeeded
//! 4. Remove every working directory
//!
//! A failing task never aborts the run. Its error is recorded in its
//! [`TaskReport`], tasks depending on it are skipped, and independent tasks
//! still run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use super::{archive, fetch, manifest, metadata, ordering};
use crate::cleanup::CleanupRegistry;
use crate::error::{Error, Result};
use crate::generator::TaskList;
use crate::scm::command::{CommandRunner, InvocationObserver, LogObserver};
use crate::scm::{BackendProvider, CommitInfo, SystemBackends};
use crate::task::{Task, TaskReport, TaskState, TaskSuccess};
use crate::version;

/// Results of [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunReport {
    /// One report per task, in declaration order.
    pub tasks: Vec<TaskReport>,
    /// Path of the composite manifest, when one was written.
    pub manifest: Option<PathBuf>,
    /// Set when every task succeeded but the manifest could not be written.
    pub manifest_error: Option<Error>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(TaskReport::is_success)
    }

    /// True when the run should end with a non-zero exit status.
    pub fn has_failures(&self) -> bool {
        !self.all_succeeded() || self.manifest_error.is_some()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|r| !r.is_success())
    }

    pub fn report(&self, filename: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|r| r.filename == filename)
    }
}

/// Runs tasks against a set of scm backends and owns their working
/// directories.
pub struct Orchestrator {
    backends: Box<dyn BackendProvider>,
    registry: CleanupRegistry,
    cancel: Arc<AtomicBool>,
    now: Option<DateTime<Utc>>,
}

impl Orchestrator {
    /// Creates an orchestrator driving the system scm binaries.
    pub fn new() -> Self {
        Self::with_cancellation(Arc::new(AtomicBool::new(false)))
    }

    /// Creates an orchestrator driving the system scm binaries that stops
    /// once `cancel` is set. A client running at that moment is killed.
    pub fn with_cancellation(cancel: Arc<AtomicBool>) -> Self {
        let runner =
            CommandRunner::new(Arc::new(LogObserver)).with_cancellation(Arc::clone(&cancel));
        let mut orchestrator = Self::with_backends(SystemBackends::with_runner(runner));
        orchestrator.cancel = cancel;
        orchestrator
    }

    pub fn with_backends(backends: impl BackendProvider + 'static) -> Self {
        Self {
            backends: Box::new(backends),
            registry: CleanupRegistry::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            now: None,
        }
    }

    /// Creates an orchestrator whose subprocess invocations are reported to
    /// `observer`.
    pub fn with_observer(observer: Arc<dyn InvocationObserver>) -> Self {
        Self::with_backends(SystemBackends::with_observer(observer))
    }

    /// Pins the time stamped on changelog entries.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Flag that, once set, makes the run skip every task not yet started.
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn registry(&self) -> &CleanupRegistry {
        &self.registry
    }

    /// Executes the complete run: tasks, manifest and cleanup.
    ///
    /// Only an invalid dependency graph is returned as `Err`; task failures
    /// are reported in the [`RunReport`].
    pub fn run(&mut self, list: &TaskList) -> Result<RunReport> {
        let result = self.process_list(&list.tasks).map(|tasks| {
            let (manifest, manifest_error) = match self.finalize(list, &tasks) {
                Ok(path) => (path, None),
                Err(e) => {
                    error!("failed to write manifest: {}", e);
                    (None, Some(e))
                }
            };
            RunReport {
                tasks,
                manifest,
                manifest_error,
            }
        });

        self.cleanup();
        result
    }

    /// Runs `tasks` in dependency order. Reports come back in declaration
    /// order.
    pub fn process_list(&mut self, tasks: &[Task]) -> Result<Vec<TaskReport>> {
        let order = ordering::execution_order(tasks)?;
        let index: HashMap<&str, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.filename.as_str(), i))
            .collect();

        let mut reports: Vec<TaskReport> = tasks.iter().map(TaskReport::new).collect();

        for i in order {
            let task = &tasks[i];

            if self.cancel.load(Ordering::SeqCst) {
                warn!("{}: skipped, run cancelled", task.filename);
                reports[i].skip("run cancelled");
                continue;
            }

            let blocked = task
                .depends_on
                .iter()
                .find(|dep| index.get(dep.as_str()).map_or(true, |&d| !reports[d].is_success()));
            if let Some(dep) = blocked {
                warn!("{}: skipped, dependency '{}' did not succeed", task.filename, dep);
                reports[i].skip(format!("dependency '{}' did not succeed", dep));
                continue;
            }

            reports[i] = self.process_single_task(task);
        }

        Ok(reports)
    }

    /// Runs one task from `Validated` to `Done` or `Error`.
    ///
    /// The working directory is released once the task reaches either state.
    pub fn process_single_task(&mut self, task: &Task) -> TaskReport {
        let mut report = TaskReport::new(task);
        report.advance(TaskState::Validated);

        match self.execute_task(task, &mut report) {
            Ok(success) => {
                info!(
                    "{}: done, version '{}', {}",
                    task.filename,
                    success.version,
                    success.archive_path.display()
                );
                report.succeed(success);
            }
            Err(e) => {
                error!("{}: {}", task.filename, e);
                report.fail(e);
            }
        }

        self.registry.release(&task.workdir());
        report
    }

    fn execute_task(&mut self, task: &Task, report: &mut TaskReport) -> Result<TaskSuccess> {
        report.advance(TaskState::Fetching);
        let workdir = fetch::prepare_workdir(task, &mut self.registry)?;
        let backend = self.backends.backend(task.scm);
        fetch::execute(backend, task, &workdir)?;

        report.advance(TaskState::VersionResolving);
        let version = version::compute_version(backend, task, &workdir)?;

        report.advance(TaskState::Packaging);
        let info = backend.describe(&workdir).unwrap_or_else(|e| {
            warn!("{}: no commit metadata: {}", task.filename, e);
            CommitInfo::default()
        });

        let archive_path = archive::execute(task, &workdir, &version, info.timestamp)?;
        let obsinfo_path = if task.use_obs_scm {
            Some(metadata::write_obsinfo(task, &version, &info)?)
        } else {
            None
        };
        let changes_path = if task.changes_generate {
            let now = self.now.unwrap_or_else(Utc::now);
            Some(metadata::write_changes(task, &version, &info, now)?)
        } else {
            None
        };

        Ok(TaskSuccess {
            version,
            archive_path,
            obsinfo_path,
            changes_path,
        })
    }

    /// Writes the composite manifest of a manifest run.
    ///
    /// Returns `None` for single-task runs and whenever a task did not
    /// succeed.
    pub fn finalize(&self, list: &TaskList, reports: &[TaskReport]) -> Result<Option<PathBuf>> {
        let Some(meta) = &list.manifest else {
            return Ok(None);
        };

        let unfinished = reports.iter().filter(|r| !r.is_success()).count();
        if unfinished > 0 {
            warn!("not writing manifest, {} task(s) did not succeed", unfinished);
            return Ok(None);
        }

        manifest::write(meta, &list.tasks).map(Some)
    }

    /// Removes every registered working directory. Safe to call repeatedly.
    pub fn cleanup(&mut self) -> Vec<Error> {
        self.registry.cleanup()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

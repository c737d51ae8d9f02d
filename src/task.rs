//! # Task Descriptors
//!
//! A [`Task`] is one source-fetch-and-package unit: which repository to check
//! out, where to put the result and how to derive its version. Tasks are
//! built and validated by the generator and never modified afterwards; what
//! a run computes for a task lives in its [`TaskReport`].
//!
//! ## Lifecycle
//!
//! ```text
//! Created -> Validated -> Fetching -> VersionResolving -> Packaging -> Done
//!     \__________\___________\______________\________________\---> Error
//! ```
//!
//! `Error` is absorbing. Reaching `Done` or `Error` releases the task's
//! working directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use log::debug;

use crate::defaults;
use crate::error::Error;
use crate::scm::Scm;
use crate::version::{VersionRewrite, VersionSpec};

/// Compression applied to the produced tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain `.tar`
    None,
    /// `.tar.gz`
    #[default]
    Gz,
}

impl Compression {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" | "tar" => Some(Compression::None),
            "gz" | "tar.gz" => Some(Compression::Gz),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "tar",
            Compression::Gz => "tar.gz",
        }
    }
}

/// One declared source-fetch-and-package unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Logical source name; the part name in manifest configurations.
    pub name: String,
    pub scm: Scm,
    pub url: String,
    /// Revision to check out, latest when unset.
    pub revision: Option<String>,
    /// Output name, unique within a run.
    pub filename: String,
    pub outdir: PathBuf,
    /// Prefix of the working directory name inside `outdir`.
    pub clone_prefix: String,
    /// Emit an `.obsinfo` metadata file next to the archive.
    pub use_obs_scm: bool,
    pub version: VersionSpec,
    pub versionformat: Option<String>,
    pub version_prefix: Option<String>,
    pub version_rewrite: Option<VersionRewrite>,
    pub changes_generate: bool,
    pub changes_author: Option<String>,
    /// Filenames of the tasks this one runs after.
    pub depends_on: Vec<String>,
    /// Build method recorded in the composite manifest.
    pub plugin: Option<String>,
    /// Glob patterns, relative to the checkout root, left out of the archive.
    pub exclude: Vec<String>,
    pub compression: Compression,
    /// Additional keys copied verbatim into the manifest part.
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Task {
    /// Creates a task with default settings for everything but the
    /// essentials.
    pub fn new(
        scm: Scm,
        url: impl Into<String>,
        filename: impl Into<String>,
        outdir: impl Into<PathBuf>,
    ) -> Self {
        let filename = filename.into();
        Self {
            name: filename.clone(),
            scm,
            url: url.into(),
            revision: None,
            filename,
            outdir: outdir.into(),
            clone_prefix: defaults::CLONE_PREFIX.to_string(),
            use_obs_scm: false,
            version: VersionSpec::Auto,
            versionformat: None,
            version_prefix: None,
            version_rewrite: None,
            changes_generate: false,
            changes_author: None,
            depends_on: Vec::new(),
            plugin: None,
            exclude: Vec::new(),
            compression: Compression::default(),
            extra: BTreeMap::new(),
        }
    }

    /// Directory the checkout is placed in.
    pub fn workdir(&self) -> PathBuf {
        self.outdir
            .join(format!("{}{}", self.clone_prefix, self.filename))
    }

    /// Top-level directory name inside the archive.
    pub fn archive_basename(&self, version: &str) -> String {
        if version.is_empty() {
            self.filename.clone()
        } else {
            format!("{}-{}", self.filename, version)
        }
    }

    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.outdir.join(format!(
            "{}.{}",
            self.archive_basename(version),
            self.compression.extension()
        ))
    }

    pub fn obsinfo_path(&self) -> PathBuf {
        self.outdir.join(format!("{}.obsinfo", self.filename))
    }

    pub fn changes_path(&self) -> PathBuf {
        self.outdir.join(format!("{}.changes", self.filename))
    }
}

/// Position of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Validated,
    Fetching,
    VersionResolving,
    Packaging,
    Done,
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, TaskState::Error)
                | (TaskState::Created, TaskState::Validated)
                | (TaskState::Validated, TaskState::Fetching)
                | (TaskState::Fetching, TaskState::VersionResolving)
                | (TaskState::VersionResolving, TaskState::Packaging)
                | (TaskState::Packaging, TaskState::Done)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Validated => "validated",
            TaskState::Fetching => "fetching",
            TaskState::VersionResolving => "resolving version",
            TaskState::Packaging => "packaging",
            TaskState::Done => "done",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

/// What a successful task produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSuccess {
    pub version: String,
    pub archive_path: PathBuf,
    pub obsinfo_path: Option<PathBuf>,
    pub changes_path: Option<PathBuf>,
}

/// How a task ended.
#[derive(Debug)]
pub enum TaskOutcome {
    Pending,
    Succeeded(TaskSuccess),
    Failed(Error),
    /// Never executed, because a dependency did not succeed or the run was
    /// cancelled.
    Skipped { reason: String },
}

/// Per-task record of a run.
#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub filename: String,
    pub state: TaskState,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn new(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            filename: task.filename.clone(),
            state: TaskState::Created,
            outcome: TaskOutcome::Pending,
        }
    }

    /// Moves to `next`. Terminal states are absorbing, so late transitions
    /// are ignored; other illegal transitions are a programming error.
    pub fn advance(&mut self, next: TaskState) {
        if self.state.is_terminal() {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {} -> {}",
            self.state,
            next
        );
        debug!("{}: {} -> {}", self.filename, self.state, next);
        self.state = next;
    }

    pub fn succeed(&mut self, success: TaskSuccess) {
        self.advance(TaskState::Done);
        self.outcome = TaskOutcome::Succeeded(success);
    }

    pub fn fail(&mut self, error: Error) {
        self.advance(TaskState::Error);
        self.outcome = TaskOutcome::Failed(error);
    }

    pub fn skip(&mut self, reason: impl Into<String>) {
        self.advance(TaskState::Error);
        self.outcome = TaskOutcome::Skipped {
            reason: reason.into(),
        };
    }

    pub fn success(&self) -> Option<&TaskSuccess> {
        match &self.outcome {
            TaskOutcome::Succeeded(s) => Some(s),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            TaskOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success().is_some()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Skipped { .. })
    }

    pub fn status(&self) -> &'static str {
        match self.outcome {
            TaskOutcome::Pending => "pending",
            TaskOutcome::Succeeded(_) => "ok",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Finds a task by filename.
pub fn find<'a>(tasks: &'a [Task], filename: &str) -> Option<&'a Task> {
    tasks.iter().find(|t| t.filename == filename)
}

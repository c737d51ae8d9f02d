//! # SCM Backends
//!
//! This module defines the capability every supported version-control system
//! provides to the orchestrator. The design mirrors the trait-based seams of
//! the rest of the crate: the orchestrator only talks to [`ScmBackend`]
//! trait objects, obtained from a [`BackendProvider`], so that tests can swap
//! the real subprocess-driven backends for fakes.
//!
//! ## Contract
//!
//! - **`fetch`** populates an existing, empty working directory with the
//!   requested revision (or the latest one).
//! - **`detect_version`** derives a raw version string from the checked-out
//!   tree. It must be deterministic for a fixed checkout state.
//! - **`describe`** optionally reports commit metadata used for archive
//!   timestamps, `.obsinfo` files and changelog entries. Backends that cannot
//!   provide it keep the default empty implementation.
//!
//! A new backend is added by implementing the two required operations and
//! adding a variant to [`Scm`].

pub mod bzr;
pub mod command;
pub mod git;
pub mod hg;
pub mod svn;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use command::{CommandRunner, InvocationObserver, LogObserver};

/// The supported version-control systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scm {
    Git,
    Hg,
    Bzr,
    Svn,
}

impl Scm {
    /// All backends, in the order they are listed to users.
    pub const ALL: [Scm; 4] = [Scm::Git, Scm::Hg, Scm::Bzr, Scm::Svn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scm::Git => "git",
            Scm::Hg => "hg",
            Scm::Bzr => "bzr",
            Scm::Svn => "svn",
        }
    }

    /// Name of the metadata directory a checkout of this backend carries.
    pub fn metadata_dir(&self) -> &'static str {
        match self {
            Scm::Git => ".git",
            Scm::Hg => ".hg",
            Scm::Bzr => ".bzr",
            Scm::Svn => ".svn",
        }
    }

    /// Version format used when the task does not configure one.
    pub fn default_versionformat(&self) -> &'static str {
        match self {
            Scm::Git => "%ct.%h",
            Scm::Hg => "{rev}",
            Scm::Bzr | Scm::Svn => "%r",
        }
    }
}

impl fmt::Display for Scm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "git" => Ok(Scm::Git),
            "hg" | "mercurial" => Ok(Scm::Hg),
            "bzr" | "bazaar" => Ok(Scm::Bzr),
            "svn" | "subversion" => Ok(Scm::Svn),
            other => Err(Error::config_with_hint(
                format!("Unsupported scm '{}'", other),
                "Use one of: git, hg, bzr, svn",
            )),
        }
    }
}

/// Commit metadata reported by [`ScmBackend::describe`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit id, changeset id or revision number of the checkout.
    pub commit: Option<String>,
    /// Commit time in seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    /// Subjects of the most recent commits, newest first.
    pub subjects: Vec<String>,
}

/// Backend-specific operations on a working directory.
pub trait ScmBackend {
    /// Which system this backend drives.
    fn scm(&self) -> Scm;

    /// Populates `workdir` with the content of `url` at `revision`, or at the
    /// latest revision when none is pinned.
    fn fetch(&self, url: &str, revision: Option<&str>, workdir: &Path) -> Result<()>;

    /// Derives the raw version string of the checkout in `workdir`.
    fn detect_version(&self, workdir: &Path, versionformat: Option<&str>) -> Result<String>;

    /// Reports commit metadata for the checkout in `workdir`.
    fn describe(&self, _workdir: &Path) -> Result<CommitInfo> {
        Ok(CommitInfo::default())
    }
}

/// Selects the backend implementation for a task's `scm`.
pub trait BackendProvider {
    fn backend(&self, scm: Scm) -> &dyn ScmBackend;
}

/// The backends that drive the real `git`, `hg`, `bzr` and `svn` binaries.
#[derive(Debug)]
pub struct SystemBackends {
    git: git::Git,
    hg: hg::Hg,
    bzr: bzr::Bzr,
    svn: svn::Svn,
}

impl SystemBackends {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(LogObserver))
    }

    /// Builds the backends around a shared invocation observer.
    pub fn with_observer(observer: Arc<dyn InvocationObserver>) -> Self {
        Self::with_runner(CommandRunner::new(observer))
    }

    /// Builds the backends around a shared runner.
    pub fn with_runner(runner: CommandRunner) -> Self {
        Self {
            git: git::Git::new(runner.clone()),
            hg: hg::Hg::new(runner.clone()),
            bzr: bzr::Bzr::new(runner.clone()),
            svn: svn::Svn::new(runner),
        }
    }
}

impl Default for SystemBackends {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendProvider for SystemBackends {
    fn backend(&self, scm: Scm) -> &dyn ScmBackend {
        match scm {
            Scm::Git => &self.git,
            Scm::Hg => &self.hg,
            Scm::Bzr => &self.bzr,
            Scm::Svn => &self.svn,
        }
    }
}

/// Fails with `VersionDetection` unless `workdir` holds a checkout of `scm`.
pub(crate) fn ensure_checkout(scm: Scm, workdir: &Path) -> Result<()> {
    if workdir.join(scm.metadata_dir()).exists() {
        Ok(())
    } else {
        Err(Error::VersionDetection {
            scm,
            path: workdir.to_path_buf(),
            message: format!("not a {} working copy", scm),
        })
    }
}

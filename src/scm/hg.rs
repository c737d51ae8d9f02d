use std::path::Path;

use super::command::{CommandError, CommandRunner};
use super::{ensure_checkout, CommitInfo, Scm, ScmBackend};
use crate::error::{Error, Result};

/// Mercurial backend driving the system `hg` binary.
#[derive(Debug, Clone)]
pub struct Hg {
    runner: CommandRunner,
}

impl Hg {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn hg(&self, workdir: &Path, args: &[&str]) -> Result<String> {
        self.runner
            .run("hg", args, Some(workdir))
            .map_err(|e| detection_error(workdir, e))
    }
}

impl ScmBackend for Hg {
    fn scm(&self) -> Scm {
        Scm::Hg
    }

    fn fetch(&self, url: &str, revision: Option<&str>, workdir: &Path) -> Result<()> {
        let target = workdir.to_string_lossy();
        self.runner
            .run("hg", &["clone", "--quiet", "--", url, &target], None)
            .map_err(|e| fetch_error(url, e))?;

        if let Some(rev) = revision {
            self.runner
                .run("hg", &["update", "--quiet", "-r", rev], Some(workdir))
                .map_err(|e| fetch_error(url, e))?;
        }

        Ok(())
    }

    fn detect_version(&self, workdir: &Path, versionformat: Option<&str>) -> Result<String> {
        ensure_checkout(Scm::Hg, workdir)?;

        let template = versionformat.unwrap_or(Scm::Hg.default_versionformat());
        self.hg(workdir, &["log", "-l1", "-r", ".", "--template", template])
    }

    fn describe(&self, workdir: &Path) -> Result<CommitInfo> {
        ensure_checkout(Scm::Hg, workdir)?;

        // hgdate renders as "<epoch> <tz offset>"
        let head = self.hg(
            workdir,
            &["log", "-l1", "-r", ".", "--template", "{node}\\n{date|hgdate}"],
        )?;
        let mut lines = head.lines();
        let commit = lines.next().map(str::to_string);
        let timestamp = lines
            .next()
            .and_then(|d| d.split_whitespace().next())
            .and_then(|t| t.parse().ok());

        let subjects = self
            .hg(
                workdir,
                &[
                    "log",
                    "-l",
                    "20",
                    "-r",
                    "reverse(ancestors(.))",
                    "--template",
                    "{desc|firstline}\\n",
                ],
            )?
            .lines()
            .map(str::to_string)
            .collect();

        Ok(CommitInfo {
            commit,
            timestamp,
            subjects,
        })
    }
}

fn fetch_error(url: &str, e: CommandError) -> Error {
    Error::Fetch {
        scm: Scm::Hg,
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn detection_error(workdir: &Path, e: CommandError) -> Error {
    Error::VersionDetection {
        scm: Scm::Hg,
        path: workdir.to_path_buf(),
        message: e.to_string(),
    }
}

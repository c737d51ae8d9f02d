use std::path::Path;

use chrono::DateTime;
use regex::Regex;

use super::command::CommandRunner;
use super::{ensure_checkout, CommitInfo, Scm, ScmBackend};
use crate::error::{Error, Result};

/// Subversion backend driving the system `svn` binary.
#[derive(Debug, Clone)]
pub struct Svn {
    runner: CommandRunner,
}

/// Fields of interest from `svn info`.
#[derive(Debug, Default, PartialEq, Eq)]
struct SvnInfo {
    last_changed_rev: Option<String>,
    last_changed_date: Option<i64>,
}

impl Svn {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn info(&self, workdir: &Path) -> Result<SvnInfo> {
        let output = self
            .runner
            .run("svn", &["info", "--non-interactive"], Some(workdir))
            .map_err(|e| Error::VersionDetection {
                scm: Scm::Svn,
                path: workdir.to_path_buf(),
                message: e.to_string(),
            })?;
        parse_info(&output)
    }
}

impl ScmBackend for Svn {
    fn scm(&self) -> Scm {
        Scm::Svn
    }

    fn fetch(&self, url: &str, revision: Option<&str>, workdir: &Path) -> Result<()> {
        let target = workdir.to_string_lossy();
        let mut args = vec!["checkout", "--non-interactive"];
        if let Some(rev) = revision {
            args.extend(["-r", rev]);
        }
        args.extend(["--", url, &*target]);

        self.runner
            .run("svn", &args, None)
            .map(|_| ())
            .map_err(|e| Error::Fetch {
                scm: Scm::Svn,
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn detect_version(&self, workdir: &Path, versionformat: Option<&str>) -> Result<String> {
        ensure_checkout(Scm::Svn, workdir)?;

        let format = versionformat.unwrap_or(Scm::Svn.default_versionformat());
        let rev = self
            .info(workdir)?
            .last_changed_rev
            .ok_or_else(|| Error::VersionDetection {
                scm: Scm::Svn,
                path: workdir.to_path_buf(),
                message: "svn info did not report a last changed revision".to_string(),
            })?;
        Ok(format.replace("%r", &rev))
    }

    fn describe(&self, workdir: &Path) -> Result<CommitInfo> {
        ensure_checkout(Scm::Svn, workdir)?;

        let info = self.info(workdir)?;
        Ok(CommitInfo {
            commit: info.last_changed_rev,
            timestamp: info.last_changed_date,
            subjects: Vec::new(),
        })
    }
}

fn parse_info(output: &str) -> Result<SvnInfo> {
    let rev_re = Regex::new(r"(?m)^Last Changed Rev:\s*(\d+)")?;
    let date_re = Regex::new(r"(?m)^Last Changed Date:\s*(\S+ \S+ [+-]\d{4})")?;

    let last_changed_rev = rev_re.captures(output).map(|c| c[1].to_string());
    let last_changed_date = date_re
        .captures(output)
        .and_then(|c| DateTime::parse_from_str(&c[1], "%Y-%m-%d %H:%M:%S %z").ok())
        .map(|d| d.timestamp());

    Ok(SvnInfo {
        last_changed_rev,
        last_changed_date,
    })
}

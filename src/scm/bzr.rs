use std::fs;
use std::path::Path;

use super::command::{CommandError, CommandRunner};
use super::{ensure_checkout, CommitInfo, Scm, ScmBackend};
use crate::error::{Error, Result};

/// Bazaar backend driving the system `bzr` binary.
#[derive(Debug, Clone)]
pub struct Bzr {
    runner: CommandRunner,
}

impl Bzr {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn revno(&self, workdir: &Path) -> Result<String> {
        self.runner
            .run("bzr", &["revno", "--tree"], Some(workdir))
            .map_err(|e| Error::VersionDetection {
                scm: Scm::Bzr,
                path: workdir.to_path_buf(),
                message: e.to_string(),
            })
    }
}

impl ScmBackend for Bzr {
    fn scm(&self) -> Scm {
        Scm::Bzr
    }

    fn fetch(&self, url: &str, revision: Option<&str>, workdir: &Path) -> Result<()> {
        // bzr refuses to check out into an existing directory
        if workdir.exists() {
            fs::remove_dir(workdir)?;
        }

        let target = workdir.to_string_lossy();
        let mut args = vec!["checkout"];
        if let Some(rev) = revision {
            args.extend(["-r", rev]);
        }
        args.extend(["--", url, &*target]);

        self.runner
            .run("bzr", &args, None)
            .map(|_| ())
            .map_err(|e| fetch_error(url, e))
    }

    fn detect_version(&self, workdir: &Path, versionformat: Option<&str>) -> Result<String> {
        ensure_checkout(Scm::Bzr, workdir)?;

        let format = versionformat.unwrap_or(Scm::Bzr.default_versionformat());
        let revno = self.revno(workdir)?;
        Ok(format.replace("%r", &revno))
    }

    fn describe(&self, workdir: &Path) -> Result<CommitInfo> {
        ensure_checkout(Scm::Bzr, workdir)?;

        Ok(CommitInfo {
            commit: Some(self.revno(workdir)?),
            ..CommitInfo::default()
        })
    }
}

fn fetch_error(url: &str, e: CommandError) -> Error {
    Error::Fetch {
        scm: Scm::Bzr,
        url: url.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::command::RecordingObserver;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_passes_revision_before_url() {
        let observer = Arc::new(RecordingObserver::new());
        let bzr = Bzr::new(CommandRunner::new(observer.clone()));
        let temp = TempDir::new().unwrap();
        let workdir = temp.path().join("_obs_libpipeline");
        fs::create_dir(&workdir).unwrap();

        let result = bzr.fetch("/nonexistent/branch", Some("42"), &workdir);
        assert!(matches!(result, Err(Error::Fetch { scm: Scm::Bzr, .. })));

        let seen = observer.invocations();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].args,
            vec![
                "checkout".to_string(),
                "-r".to_string(),
                "42".to_string(),
                "--".to_string(),
                "/nonexistent/branch".to_string(),
                workdir.to_string_lossy().to_string(),
            ]
        );
    }

    #[test]
    fn test_detect_version_requires_bzr_checkout() {
        let temp = TempDir::new().unwrap();
        let bzr = Bzr::new(CommandRunner::default());
        assert!(matches!(
            bzr.detect_version(temp.path(), None),
            Err(Error::VersionDetection { scm: Scm::Bzr, .. })
        ));
    }
}

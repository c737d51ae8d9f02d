use std::path::Path;

use super::command::{CommandError, CommandRunner};
use super::{ensure_checkout, CommitInfo, Scm, ScmBackend};
use crate::error::{Error, Result};

const PARENT_TAG: &str = "@PARENT_TAG@";
const TAG_OFFSET: &str = "@TAG_OFFSET@";
const CHANGELOG_DEPTH: &str = "20";

/// Git backend driving the system `git` binary.
///
/// Using the system binary picks up SSH keys, credential helpers and any
/// authentication configured in `~/.gitconfig`.
#[derive(Debug, Clone)]
pub struct Git {
    runner: CommandRunner,
}

impl Git {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn git(&self, workdir: &Path, args: &[&str]) -> Result<String> {
        self.runner
            .run("git", args, Some(workdir))
            .map_err(|e| detection_error(workdir, e))
    }

    /// Expands `@PARENT_TAG@` and `@TAG_OFFSET@` in a version format.
    fn expand_tag_placeholders(&self, workdir: &Path, format: &str) -> Result<String> {
        if !format.contains(PARENT_TAG) && !format.contains(TAG_OFFSET) {
            return Ok(format.to_string());
        }

        let tag = self
            .git(workdir, &["describe", "--tags", "--abbrev=0"])
            .map_err(|_| Error::VersionDetection {
                scm: Scm::Git,
                path: workdir.to_path_buf(),
                message: format!("{} or {} used but no tag found", PARENT_TAG, TAG_OFFSET),
            })?;

        let mut expanded = format.replace(PARENT_TAG, &tag);
        if expanded.contains(TAG_OFFSET) {
            let range = format!("{}..HEAD", tag);
            let offset = self.git(workdir, &["rev-list", "--count", &range])?;
            expanded = expanded.replace(TAG_OFFSET, &offset);
        }
        Ok(expanded)
    }
}

impl ScmBackend for Git {
    fn scm(&self) -> Scm {
        Scm::Git
    }

    fn fetch(&self, url: &str, revision: Option<&str>, workdir: &Path) -> Result<()> {
        let target = workdir.to_string_lossy();
        self.runner
            .run("git", &["clone", "--quiet", "--", url, &target], None)
            .map_err(|e| fetch_error(url, e))?;

        if let Some(rev) = revision {
            self.runner
                .run("git", &["checkout", "--quiet", rev, "--"], Some(workdir))
                .map_err(|e| Error::Fetch {
                    scm: Scm::Git,
                    url: url.to_string(),
                    message: format!("revision '{}' not found: {}", rev, e.message),
                })?;
        }

        Ok(())
    }

    fn detect_version(&self, workdir: &Path, versionformat: Option<&str>) -> Result<String> {
        ensure_checkout(Scm::Git, workdir)?;

        let format = versionformat.unwrap_or(Scm::Git.default_versionformat());
        let format = self.expand_tag_placeholders(workdir, format)?;
        let pretty = format!("--pretty=format:{}", format);

        self.git(
            workdir,
            &["log", "-n1", "--date=format:%Y%m%d", pretty.as_str()],
        )
    }

    fn describe(&self, workdir: &Path) -> Result<CommitInfo> {
        ensure_checkout(Scm::Git, workdir)?;

        let head = self.git(workdir, &["log", "-n1", "--pretty=format:%H%n%ct"])?;
        let mut lines = head.lines();
        let commit = lines.next().map(str::to_string);
        let timestamp = lines.next().and_then(|t| t.trim().parse().ok());

        let subjects = self
            .git(
                workdir,
                &["log", "--no-merges", "-n", CHANGELOG_DEPTH, "--pretty=format:%s"],
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
    // Provide helpful error message for common auth failures
    let message = if e.message.contains("Authentication failed")
        || e.message.contains("Permission denied")
        || e.message.contains("Could not read from remote repository")
    {
        format!(
            "Authentication failed. Make sure you have access to the repository.\n\
            For private repos, ensure you have:\n\
            - SSH key added to ssh-agent\n\
            - Git credentials configured\n\
            Error: {}",
            e.message
        )
    } else {
        e.message
    };

    Error::Fetch {
        scm: Scm::Git,
        url: url.to_string(),
        message,
    }
}

fn detection_error(workdir: &Path, e: CommandError) -> Error {
    Error::VersionDetection {
        scm: Scm::Git,
        path: workdir.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::command::RecordingObserver;
    use regex::Regex;
    use std::process::Command;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_upstream() -> TempDir {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "--quiet"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
        std::fs::write(dir.path().join("README"), "hello\n").unwrap();
        run_git(dir.path(), &["add", "README"]);
        run_git(dir.path(), &["commit", "--quiet", "-m", "initial import"]);
        run_git(dir.path(), &["tag", "1.2.0"]);
        std::fs::write(dir.path().join("NEWS"), "news\n").unwrap();
        run_git(dir.path(), &["add", "NEWS"]);
        run_git(dir.path(), &["commit", "--quiet", "-m", "add news"]);
        dir
    }

    fn checkout(upstream: &TempDir) -> (Git, TempDir, std::path::PathBuf) {
        let git = Git::new(CommandRunner::default());
        let out = TempDir::new().unwrap();
        let workdir = out.path().join("_obs_repo");
        std::fs::create_dir(&workdir).unwrap();
        git.fetch(&upstream.path().to_string_lossy(), None, &workdir)
            .unwrap();
        (git, out, workdir)
    }

    #[test]
    fn test_detect_version_outside_repository() {
        let temp = TempDir::new().unwrap();
        let git = Git::new(CommandRunner::default());
        let err = git.detect_version(temp.path(), None).unwrap_err();
        assert!(matches!(err, Error::VersionDetection { scm: Scm::Git, .. }));
    }

    #[test]
    fn test_fetch_reports_invocations() {
        let observer = Arc::new(RecordingObserver::new());
        let git = Git::new(CommandRunner::new(observer.clone()));
        let temp = TempDir::new().unwrap();

        let err = git
            .fetch(
                &temp.path().join("missing").to_string_lossy(),
                None,
                &temp.path().join("work"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { scm: Scm::Git, .. }));

        let seen = observer.invocations();
        assert_eq!(seen[0].program, "git");
        assert_eq!(seen[0].args[0], "clone");
    }

    #[test]
    fn test_fetch_url_never_parsed_as_option() {
        let observer = Arc::new(RecordingObserver::new());
        let git = Git::new(CommandRunner::new(observer.clone()));
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("upload-pack-ran");
        let url = format!("--upload-pack=touch {}", marker.display());

        let result = git.fetch(&url, None, &temp.path().join("work"));
        assert!(result.is_err());
        assert!(!marker.exists());

        let seen = observer.invocations();
        assert_eq!(seen[0].args[..3], ["clone", "--quiet", "--"]);
        assert_eq!(seen[0].args[3], url);
    }

    #[test]
    fn test_fetch_and_detect_default_version() {
        if !git_available() {
            return;
        }
        let upstream = make_upstream();
        let (git, _out, workdir) = checkout(&upstream);

        let version = git.detect_version(&workdir, None).unwrap();
        let re = Regex::new(r"^\d+\.[0-9a-f]{7,}$").unwrap();
        assert!(re.is_match(&version), "unexpected version {}", version);

        // Deterministic for a fixed checkout
        assert_eq!(git.detect_version(&workdir, None).unwrap(), version);
    }

    #[test]
    fn test_detect_version_with_tag_placeholders() {
        if !git_available() {
            return;
        }
        let upstream = make_upstream();
        let (git, _out, workdir) = checkout(&upstream);

        let version = git
            .detect_version(&workdir, Some("@PARENT_TAG@+git@TAG_OFFSET@"))
            .unwrap();
        assert_eq!(version, "1.2.0+git1");
    }

    #[test]
    fn test_fetch_pinned_revision() {
        if !git_available() {
            return;
        }
        let upstream = make_upstream();
        let git = Git::new(CommandRunner::default());
        let out = TempDir::new().unwrap();
        let workdir = out.path().join("_obs_repo");
        std::fs::create_dir(&workdir).unwrap();

        git.fetch(&upstream.path().to_string_lossy(), Some("1.2.0"), &workdir)
            .unwrap();
        assert!(workdir.join("README").exists());
        assert!(!workdir.join("NEWS").exists());
    }

    #[test]
    fn test_fetch_unknown_revision() {
        if !git_available() {
            return;
        }
        let upstream = make_upstream();
        let git = Git::new(CommandRunner::default());
        let out = TempDir::new().unwrap();
        let workdir = out.path().join("_obs_repo");
        std::fs::create_dir(&workdir).unwrap();

        let err = git
            .fetch(
                &upstream.path().to_string_lossy(),
                Some("no-such-tag"),
                &workdir,
            )
            .unwrap_err();
        assert!(err.to_string().contains("no-such-tag"));
    }

    #[test]
    fn test_describe() {
        if !git_available() {
            return;
        }
        let upstream = make_upstream();
        let (git, _out, workdir) = checkout(&upstream);

        let info = git.describe(&workdir).unwrap();
        assert_eq!(info.commit.as_ref().map(|c| c.len()), Some(40));
        assert!(info.timestamp.is_some());
        assert_eq!(info.subjects, vec!["add news", "initial import"]);
    }
}

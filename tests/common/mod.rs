//! Shared test utilities for integration and E2E tests.
//!
//! Provides configuration snippets, a temp-directory fixture, scripted scm
//! backends for driving the orchestrator without any client binary, and
//! helpers that build real git repositories when `git` is installed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::SNAPCRAFT);
//!     fixture.command().arg("validate").assert().success();
//! }
//! ```

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tar_scm::error::{Error, Result};
use tar_scm::scm::{BackendProvider, CommitInfo, Scm, ScmBackend};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{configs, git_available, make_git_repo, TestFixture};
}

/// Common configuration YAML snippets for testing.
pub mod configs {
    /// Two parts, one building after the other.
    pub const SNAPCRAFT: &str = r#"
name: pipelinetest
version: 1.0
summary: Libpipeline example
description: Example package of an autotools project built with snapcraft.
apps:
  pipelinetest:
    command: ./bin/test
parts:
  libpipeline:
    plugin: autotools
    source: lp:~mterry/libpipeline/printf
    source-type: bzr
  kanku:
    plugin: make
    source: git@github.com:M0ses/kanku
    source-type: git
    after:
      - libpipeline
"#;

    /// Parts that depend on each other.
    pub const CYCLE: &str = r#"
name: loop
parts:
  a:
    source: https://example.com/a.git
    source-type: git
    after: [b]
  b:
    source: https://example.com/b.git
    source-type: git
    after: [a]
"#;

    /// Two parts with the same output name.
    pub const DUPLICATE_FILENAME: &str = r#"
name: dup
parts:
  a:
    source: https://example.com/a.git
    source-type: git
    filename: same
  b:
    source: https://example.com/b.git
    source-type: git
    filename: same
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "scm: [unclosed";
}

/// A test fixture that provides a temporary directory with optional config.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `tar_scm.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("tar_scm.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("tar_scm.yaml")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    ///
    /// `RUST_LOG` is cleared so log output does not depend on the caller.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tar-scm");
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("TAR_SCM_CONFIG")
            .env_remove("TAR_SCM_OUTDIR");
        cmd
    }

    /// Like [`command`](Self::command), but for runs that must be spawned
    /// and signalled while they are still working.
    pub fn std_command(&self) -> StdCommand {
        let mut cmd = StdCommand::new(env!("CARGO_BIN_EXE_tar-scm"));
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("TAR_SCM_CONFIG")
            .env_remove("TAR_SCM_OUTDIR");
        cmd
    }

    /// Installs an executable shell script as `bin/<name>` and returns a
    /// `PATH` value that finds it before the system binaries.
    #[cfg(unix)]
    pub fn with_fake_client(&self, name: &str, script: &str) -> std::ffi::OsString {
        use std::os::unix::fs::PermissionsExt;

        let bin = self.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let path = bin.join(name);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let mut dirs = vec![bin];
        if let Some(system) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&system));
        }
        std::env::join_paths(dirs).unwrap()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripted backend: "fetching" writes a few files named after the url.
///
/// Urls listed in `failing` fail to fetch. When `cancel_on` names a url, the
/// shared cancellation flag is raised while that url is fetched.
#[derive(Default)]
pub struct ScriptedScm {
    pub versions: HashMap<String, String>,
    pub failing: HashSet<String>,
    pub cancel_on: Arc<Mutex<Option<(String, Arc<AtomicBool>)>>>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl ScriptedScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, url: &str, version: &str) -> Self {
        self.versions.insert(url.to_string(), version.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl ScmBackend for ScriptedScm {
    fn scm(&self) -> Scm {
        Scm::Git
    }

    fn fetch(&self, url: &str, _revision: Option<&str>, workdir: &Path) -> Result<()> {
        self.fetched.lock().unwrap().push(url.to_string());

        if let Some((trigger, flag)) = self.cancel_on.lock().unwrap().as_ref() {
            if trigger == url {
                flag.store(true, Ordering::SeqCst);
            }
        }

        if self.failing.contains(url) {
            return Err(Error::Fetch {
                scm: Scm::Git,
                url: url.to_string(),
                message: "repository not reachable".to_string(),
            });
        }

        fs::create_dir_all(workdir.join(".git"))?;
        fs::create_dir_all(workdir.join("src"))?;
        fs::write(workdir.join("README"), format!("checkout of {}\n", url))?;
        fs::write(workdir.join("src/lib.c"), "int answer = 42;\n")?;
        Ok(())
    }

    fn detect_version(&self, workdir: &Path, _versionformat: Option<&str>) -> Result<String> {
        Ok(self
            .versions
            .get(workdir_url(workdir).as_str())
            .cloned()
            .unwrap_or_else(|| "0.0.1".to_string()))
    }

    fn describe(&self, _workdir: &Path) -> Result<CommitInfo> {
        Ok(CommitInfo {
            commit: Some("0123456789abcdef".to_string()),
            timestamp: Some(1_551_691_230),
            subjects: vec!["initial import".to_string()],
        })
    }
}

/// Reads the url a [`ScriptedScm`] checkout was made from.
fn workdir_url(workdir: &Path) -> String {
    fs::read_to_string(workdir.join("README"))
        .map(|s| s.trim().trim_start_matches("checkout of ").to_string())
        .unwrap_or_default()
}

/// Serves one [`ScriptedScm`] for every scm.
pub struct ScriptedBackends(pub ScriptedScm);

impl BackendProvider for ScriptedBackends {
    fn backend(&self, _scm: Scm) -> &dyn ScmBackend {
        &self.0
    }
}

/// Returns true when a usable `git` binary is on the PATH.
pub fn git_available() -> bool {
    StdCommand::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(repo_dir)
        .env("GIT_AUTHOR_DATE", "2019-03-04T09:20:30+00:00")
        .env("GIT_COMMITTER_DATE", "2019-03-04T09:20:30+00:00")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Creates a git repository at `dir` with one tagged commit.
pub fn make_git_repo(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    run_git(dir, &["init", "--quiet"]);
    run_git(dir, &["config", "user.name", "test-user"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
    fs::write(dir.join("README"), "upstream\n").unwrap();
    run_git(dir, &["add", "README"]);
    run_git(dir, &["commit", "--quiet", "-m", "initial import"]);
    run_git(dir, &["tag", "v1.2.0"]);
    dir.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_config("scm: git");
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        for config in [configs::SNAPCRAFT, configs::CYCLE, configs::DUPLICATE_FILENAME] {
            serde_yaml::from_str::<serde_yaml::Value>(config).expect("Config should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        assert!(serde_yaml::from_str::<serde_yaml::Value>(configs::INVALID_YAML).is_err());
    }
}

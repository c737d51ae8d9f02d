//! # Version Resolution
//!
//! This module turns the raw version string a backend detects into the final
//! version used in archive names and metadata.
//!
//! ## Process
//!
//! 1.  **Detection**: The task's [`VersionSpec`] decides whether the backend
//!     is asked at all. `_auto_` detects, `_none_` yields an empty version and
//!     any other value is taken literally.
//!
//! 2.  **Rewrite**: If a [`VersionRewrite`] rule is configured, its pattern is
//!     searched in the raw version and the matches are replaced. A rule that
//!     does not match is an error, never a silent pass-through.
//!
//! 3.  **Prefix**: A non-empty prefix is joined to the version with a `.`
//!     (`r` + `0.0.1` gives `r.0.0.1`).
//!
//! The rewrite happens before the prefix so that patterns anchored at the
//! start of the string see the detected version, not the prefix.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::scm::ScmBackend;
use crate::task::Task;

/// Separator placed between a version prefix and the version.
pub const PREFIX_SEPARATOR: char = '.';

/// How a task obtains its raw version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// Ask the backend (`_auto_`).
    #[default]
    Auto,
    /// No version at all (`_none_`).
    None,
    /// Use the given string as the raw version.
    Literal(String),
}

impl VersionSpec {
    pub fn parse(value: &str) -> Self {
        match value {
            "_auto_" => VersionSpec::Auto,
            "_none_" => VersionSpec::None,
            other => VersionSpec::Literal(other.to_string()),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Auto => f.write_str("_auto_"),
            VersionSpec::None => f.write_str("_none_"),
            VersionSpec::Literal(v) => f.write_str(v),
        }
    }
}

/// A regex capture-and-replace rule applied to the raw version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRewrite {
    pub pattern: String,
    /// Replacement text. Groups are referenced as `\1` or `\g<name>`; a `$`
    /// is literal text.
    pub replacement: String,
}

impl VersionRewrite {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    pub fn regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.pattern)?)
    }

    /// Applies the rule to `raw`.
    pub fn apply(&self, raw: &str) -> Result<String> {
        let re = self.regex()?;
        if !re.is_match(raw) {
            return Err(Error::VersionRewrite {
                pattern: self.pattern.clone(),
                version: raw.to_string(),
            });
        }
        let replacement = translate_replacement(&self.replacement);
        Ok(re.replace_all(raw, replacement.as_str()).into_owned())
    }
}

/// Joins `prefix` and `version`, leaving the version alone when the prefix
/// is unset or empty.
pub fn apply_prefix(version: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}{}{}", p, PREFIX_SEPARATOR, version),
        _ => version.to_string(),
    }
}

/// Resolves the final version: rewrite first, then prefix.
pub fn resolve(raw: &str, prefix: Option<&str>, rewrite: Option<&VersionRewrite>) -> Result<String> {
    let version = match rewrite {
        Some(rule) => rule.apply(raw)?,
        None => raw.to_string(),
    };
    Ok(apply_prefix(&version, prefix))
}

/// Computes the version of `task`, whose checkout lives in `workdir`.
///
/// Prefix-only tasks take the plain concatenation path; tasks with a rewrite
/// rule go through [`resolve`]. Both produce `prefix.version`.
pub fn compute_version(backend: &dyn ScmBackend, task: &Task, workdir: &Path) -> Result<String> {
    let raw = match &task.version {
        VersionSpec::None => return Ok(String::new()),
        VersionSpec::Literal(v) => v.clone(),
        VersionSpec::Auto => backend.detect_version(workdir, task.versionformat.as_deref())?,
    };

    match &task.version_rewrite {
        Some(rule) => resolve(&raw, task.version_prefix.as_deref(), Some(rule)),
        None => Ok(apply_prefix(&raw, task.version_prefix.as_deref())),
    }
}

/// Converts `\1` and `\g<name>` group references to the `${1}` form the
/// `regex` crate expects and escapes every `$` as `$$`.
fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {}
            '$' => {
                out.push_str("$$");
                continue;
            }
            _ => {
                out.push(c);
                continue;
            }
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                }
                out.push_str(&format!("${{{}}}", group));
            }
            Some('g') => {
                chars.next();
                if chars.peek() == Some(&'<') {
                    chars.next();
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    out.push_str(&format!("${{{}}}", name));
                } else {
                    out.push_str("\\g");
                }
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::{CommitInfo, Scm};
    use std::path::PathBuf;

    struct FakeScm {
        version: &'static str,
    }

    impl ScmBackend for FakeScm {
        fn scm(&self) -> Scm {
            Scm::Git
        }

        fn fetch(&self, _url: &str, _revision: Option<&str>, _workdir: &Path) -> Result<()> {
            Ok(())
        }

        fn detect_version(&self, _workdir: &Path, _versionformat: Option<&str>) -> Result<String> {
            Ok(self.version.to_string())
        }

        fn describe(&self, _workdir: &Path) -> Result<CommitInfo> {
            Ok(CommitInfo::default())
        }
    }

    fn task() -> Task {
        Task::new(Scm::Git, "https://example.com/repo.git", "repo", PathBuf::from("/tmp/out"))
    }

    #[test]
    fn test_resolve_rewrite_without_prefix() {
        let rule = VersionRewrite::new(r"v(\d[\d.]*)", r"\1-stable");
        assert_eq!(resolve("v0.0.1", Some(""), Some(&rule)).unwrap(), "0.0.1-stable");
    }

    #[test]
    fn test_resolve_prefix_without_rewrite() {
        assert_eq!(resolve("0.0.1", Some("r"), None).unwrap(), "r.0.0.1");
    }

    #[test]
    fn test_resolve_rewrite_then_prefix() {
        // The anchored pattern must see the raw version, not the prefix
        let rule = VersionRewrite::new(r"^v(.*)$", r"\1");
        assert_eq!(resolve("v2.4", Some("r"), Some(&rule)).unwrap(), "r.2.4");
    }

    #[test]
    fn test_resolve_rewrite_no_match_is_error() {
        let rule = VersionRewrite::new(r"^v(\d+)", r"\1");
        let err = resolve("1234.abcdef", None, Some(&rule)).unwrap_err();
        assert!(matches!(err, Error::VersionRewrite { .. }));
    }

    #[test]
    fn test_resolve_identity() {
        assert_eq!(resolve("0.0.1", None, None).unwrap(), "0.0.1");
    }

    #[test]
    fn test_compute_version_identity() {
        let scm = FakeScm { version: "0.0.1" };
        let ver = compute_version(&scm, &task(), Path::new("/nonexistent")).unwrap();
        assert_eq!(ver, "0.0.1");
    }

    #[test]
    fn test_compute_version_prefix_only() {
        let scm = FakeScm { version: "0.0.1" };
        let mut task = task();
        task.version_prefix = Some("r".to_string());
        let ver = compute_version(&scm, &task, Path::new("/nonexistent")).unwrap();
        assert_eq!(ver, "r.0.0.1");
    }

    #[test]
    fn test_compute_version_with_rewrite() {
        let scm = FakeScm { version: "v0.0.1" };
        let mut task = task();
        task.version_rewrite = Some(VersionRewrite::new(r"v(\d[\d\.]*)", "\\1-stable"));
        let ver = compute_version(&scm, &task, Path::new("/nonexistent")).unwrap();
        assert_eq!(ver, "0.0.1-stable");
    }

    #[test]
    fn test_compute_version_prefix_paths_agree() {
        let scm = FakeScm { version: "1.0" };
        let mut prefix_only = task();
        prefix_only.version_prefix = Some("r".to_string());

        let mut with_rewrite = prefix_only.clone();
        with_rewrite.version_rewrite = Some(VersionRewrite::new("^(.*)$", r"\1"));

        let workdir = Path::new("/nonexistent");
        assert_eq!(
            compute_version(&scm, &prefix_only, workdir).unwrap(),
            compute_version(&scm, &with_rewrite, workdir).unwrap()
        );
    }

    #[test]
    fn test_compute_version_none_and_literal() {
        let scm = FakeScm { version: "9.9" };
        let mut task = task();

        task.version = VersionSpec::None;
        task.version_prefix = Some("r".to_string());
        assert_eq!(compute_version(&scm, &task, Path::new("/x")).unwrap(), "");

        task.version = VersionSpec::Literal("2.0".to_string());
        assert_eq!(compute_version(&scm, &task, Path::new("/x")).unwrap(), "r.2.0");
    }

    #[test]
    fn test_version_spec_parse() {
        assert_eq!(VersionSpec::parse("_auto_"), VersionSpec::Auto);
        assert_eq!(VersionSpec::parse("_none_"), VersionSpec::None);
        assert_eq!(
            VersionSpec::parse("1.0"),
            VersionSpec::Literal("1.0".to_string())
        );
        assert_eq!(VersionSpec::parse("1.0").to_string(), "1.0");
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement(r"\1-stable"), "${1}-stable");
        assert_eq!(translate_replacement(r"\12"), "${12}");
        assert_eq!(translate_replacement(r"\g<major>.x"), "${major}.x");
        assert_eq!(translate_replacement("$1"), "$$1");
        assert_eq!(translate_replacement(r"\1$x"), "${1}$$x");
        assert_eq!(translate_replacement(r"a\\b"), r"a\b");
    }

    #[test]
    fn test_dollar_in_replacement_is_literal() {
        let rule = VersionRewrite::new(r"v(\d+)", r"\1$x");
        assert_eq!(rule.apply("v12").unwrap(), "12$x");

        let rule = VersionRewrite::new(r"v(\d+)", "$1");
        assert_eq!(rule.apply("v12").unwrap(), "$1");
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_no_prefix_no_rewrite_is_identity(raw in "[0-9a-z.+~]{0,20}") {
            prop_assert_eq!(resolve(&raw, None, None).unwrap(), raw);
        }

        #[test]
        fn prop_prefix_is_joined_with_separator(
            raw in "[0-9][0-9a-z.]{0,12}",
            prefix in "[a-z][a-z0-9]{0,6}",
        ) {
            let resolved = resolve(&raw, Some(&prefix), None).unwrap();
            prop_assert_eq!(resolved, format!("{}.{}", prefix, raw));
        }

        #[test]
        fn prop_rewrite_runs_before_prefix(
            digits in "[0-9]{1,3}(\\.[0-9]{1,3}){0,2}",
            prefix in "[a-z]{1,4}",
        ) {
            let rule = VersionRewrite::new(r"^v(.+)$", r"\1");
            let raw = format!("v{}", digits);
            let resolved = resolve(&raw, Some(&prefix), Some(&rule)).unwrap();
            prop_assert_eq!(resolved, format!("{}.{}", prefix, digits));
        }
    }
}

//! # Task List Generation
//!
//! Turns a parsed [`Config`] into the validated, ordered list of [`Task`]s a
//! run executes.
//!
//! ## Process
//!
//! 1.  **Merge**: Each task's raw settings are merged over the run defaults
//!     (CLI flags), with the task's own values winning.
//!
//! 2.  **Build**: Every merged configuration becomes a typed [`Task`]. Part
//!     names double as filenames unless a filename is given; a single task
//!     without a filename is named after the last component of its url.
//!     Manifest parts and AppImage sources write `.obsinfo` files unless
//!     they say otherwise.
//!
//! 3.  **Validate**: The whole list is checked eagerly. Unknown scm, missing
//!     url, duplicate filenames, unresolvable or cyclic `after` references,
//!     bad rewrite patterns and bad exclude globs all fail here, before any
//!     directory is created or subprocess started.
//!
//! All failures are [`Error::Configuration`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use log::debug;
use serde_yaml::Value;

use crate::config::{AppImageBuild, Config, ManifestConfig, TaskConfig};
use crate::defaults;
use crate::error::{Error, Result};
use crate::phases::ordering;
use crate::scm::Scm;
use crate::task::{Compression, Task};
use crate::version::{VersionRewrite, VersionSpec};

/// Replacement used when a rewrite pattern is given without one.
pub const DEFAULT_REWRITE_REPLACEMENT: &str = r"\1";

/// What a manifest run needs to write its composite descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestMeta {
    /// Directory the manifest is written to.
    pub outdir: PathBuf,
    /// Top-level keys copied into the manifest, sorted.
    pub metadata: BTreeMap<String, Value>,
}

/// The validated output of [`generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    /// Tasks in declaration order.
    pub tasks: Vec<Task>,
    /// Set for manifest configurations only.
    pub manifest: Option<ManifestMeta>,
}

impl TaskList {
    pub fn is_manifest(&self) -> bool {
        self.manifest.is_some()
    }
}

/// Builds and validates the task list for `config`.
///
/// `defaults` supplies values for every field a task leaves unset.
pub fn generate(config: &Config, defaults: &TaskConfig) -> Result<TaskList> {
    let list = match config {
        Config::Single(raw) => {
            let task = build_task(None, &raw.merged_over(defaults))?;
            TaskList {
                tasks: vec![task],
                manifest: None,
            }
        }
        Config::Manifest(manifest) => generate_manifest(manifest, defaults)?,
        Config::AppImage(build) => generate_appimage(build, defaults)?,
    };

    validate(&list.tasks)?;
    debug!("generated {} task(s)", list.tasks.len());
    Ok(list)
}

fn generate_manifest(manifest: &ManifestConfig, defaults: &TaskConfig) -> Result<TaskList> {
    match manifest.metadata.get("name") {
        Some(Value::String(name)) if !name.is_empty() => {}
        _ => {
            return Err(Error::config_with_hint(
                "Manifest has no 'name'",
                "Add a top-level 'name:' next to 'parts:'",
            ))
        }
    }
    if manifest.parts.is_empty() {
        return Err(Error::config("Manifest declares no parts"));
    }

    let mut tasks = manifest
        .parts
        .iter()
        .map(|(name, raw)| build_task(Some(name), &with_obs_scm(raw.merged_over(defaults))))
        .collect::<Result<Vec<_>>>()?;

    // `after` names parts; tasks reference each other by filename
    let filenames: HashMap<String, String> = tasks
        .iter()
        .map(|t| (t.name.clone(), t.filename.clone()))
        .collect();
    for task in &mut tasks {
        for dep in &mut task.depends_on {
            if let Some(filename) = filenames.get(dep.as_str()) {
                *dep = filename.clone();
            }
        }
    }

    let outdir = defaults
        .outdir
        .clone()
        .unwrap_or_else(defaults::default_outdir);

    Ok(TaskList {
        tasks,
        manifest: Some(ManifestMeta {
            outdir,
            metadata: manifest.metadata.clone(),
        }),
    })
}

fn generate_appimage(build: &AppImageBuild, defaults: &TaskConfig) -> Result<TaskList> {
    let tasks = build
        .sources()
        .into_iter()
        .map(|(scm, url)| {
            let raw = TaskConfig {
                scm: Some(scm.to_string()),
                url: Some(url.to_string()),
                ..TaskConfig::default()
            };
            build_task(None, &with_obs_scm(raw.merged_over(defaults)))
        })
        .collect::<Result<Vec<_>>>()?;

    if tasks.is_empty() {
        debug!("appimage recipe has no build sources");
    }
    Ok(TaskList {
        tasks,
        manifest: None,
    })
}

/// Turns `use_obs_scm` on unless the configuration decided otherwise.
fn with_obs_scm(mut raw: TaskConfig) -> TaskConfig {
    raw.use_obs_scm.get_or_insert(true);
    raw
}

/// Rejects values that a scm client would read as a command-line option.
fn reject_option_like(field: &str, value: &str, context: &str) -> Result<()> {
    if value.starts_with('-') {
        return Err(Error::config_with_hint(
            format!("Invalid {} '{}' for {}", field, value, context),
            format!("A {} must not start with '-'", field),
        ));
    }
    Ok(())
}

fn build_task(part: Option<&str>, raw: &TaskConfig) -> Result<Task> {
    let context = match part {
        Some(name) => format!("part '{}'", name),
        None => "task".to_string(),
    };

    let scm: Scm = raw
        .scm
        .as_deref()
        .ok_or_else(|| {
            Error::config_with_hint(
                format!("No scm given for {}", context),
                "Set 'scm:' (or 'source-type:') to git, hg, bzr or svn",
            )
        })?
        .parse()?;

    let url = match raw.url.as_deref() {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => {
            return Err(Error::config_with_hint(
                format!("No url given for {}", context),
                "Set 'url:' (or 'source:') to the repository location",
            ))
        }
    };
    reject_option_like("url", &url, &context)?;

    let revision = raw.revision.clone().filter(|r| !r.is_empty());
    if let Some(revision) = &revision {
        reject_option_like("revision", revision, &context)?;
    }

    let filename = match (&raw.filename, part) {
        (Some(filename), _) => filename.clone(),
        (None, Some(name)) => name.to_string(),
        (None, None) => filename_from_url(&url),
    };
    if filename.is_empty() || filename.contains('/') || filename == "." || filename == ".." {
        return Err(Error::config(format!(
            "Invalid filename '{}' for {}",
            filename, context
        )));
    }

    let outdir = raw.outdir.clone().ok_or_else(|| {
        Error::config_with_hint(
            format!("No output directory for {}", context),
            "Pass --outdir or set TAR_SCM_OUTDIR",
        )
    })?;

    let version_rewrite = match (&raw.versionrewrite_pattern, &raw.versionrewrite_replacement) {
        (Some(pattern), replacement) => {
            let rule = VersionRewrite::new(
                pattern.clone(),
                replacement
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REWRITE_REPLACEMENT.to_string()),
            );
            rule.regex().map_err(|e| {
                Error::config(format!(
                    "Invalid versionrewrite pattern '{}' for {}: {}",
                    pattern, context, e
                ))
            })?;
            Some(rule)
        }
        (None, Some(_)) => {
            return Err(Error::config_with_hint(
                format!("versionrewrite replacement without pattern for {}", context),
                "Set 'versionrewrite_pattern:' as well",
            ))
        }
        (None, None) => None,
    };

    let exclude = raw.exclude.clone().unwrap_or_default();
    for pattern in &exclude {
        glob::Pattern::new(pattern).map_err(|e| {
            Error::config(format!(
                "Invalid exclude pattern '{}' for {}: {}",
                pattern, context, e
            ))
        })?;
    }

    let compression = match raw.compression.as_deref() {
        None => Compression::default(),
        Some(value) => Compression::parse(value).ok_or_else(|| {
            Error::config_with_hint(
                format!("Unsupported compression '{}' for {}", value, context),
                "Use gz or none",
            )
        })?,
    };

    Ok(Task {
        name: part.map(str::to_string).unwrap_or_else(|| filename.clone()),
        scm,
        url,
        revision,
        filename,
        outdir,
        clone_prefix: raw
            .clone_prefix
            .clone()
            .unwrap_or_else(|| defaults::CLONE_PREFIX.to_string()),
        use_obs_scm: raw.use_obs_scm.unwrap_or(false),
        version: raw
            .version
            .as_deref()
            .map(VersionSpec::parse)
            .unwrap_or_default(),
        versionformat: raw.versionformat.clone(),
        version_prefix: raw.versionprefix.clone(),
        version_rewrite,
        changes_generate: raw.changesgenerate.unwrap_or(false),
        changes_author: raw.changesauthor.clone(),
        depends_on: raw.after.clone().unwrap_or_default(),
        plugin: raw.plugin.clone(),
        exclude,
        compression,
        extra: raw.extra.clone(),
    })
}

/// `https://host/group/project.git` gives `project`.
fn filename_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

fn validate(tasks: &[Task]) -> Result<()> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.filename.as_str()) {
            return Err(Error::config_with_hint(
                format!("Duplicate filename '{}'", task.filename),
                "Give each task a distinct 'filename:'",
            ));
        }
    }

    for task in tasks {
        for dep in &task.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(Error::config(format!(
                    "'{}' runs after unknown task '{}'",
                    task.name, dep
                )));
            }
        }
    }

    ordering::execution_order(tasks).map(|_| ())
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_single_task_preserves_fields(
            scm in prop::sample::select(vec!["git", "hg", "bzr", "svn"]),
            url in "https://[a-z]{3,10}\\.org/[a-z]{1,8}",
            filename in "[a-z][a-z0-9_-]{0,15}",
            revision in proptest::option::of("[0-9a-f]{7,12}"),
            prefix in proptest::option::of("[a-z0-9]{1,5}"),
            changes in any::<bool>(),
        ) {
            let raw = TaskConfig {
                scm: Some(scm.to_string()),
                url: Some(url.clone()),
                filename: Some(filename.clone()),
                revision: revision.clone(),
                versionprefix: prefix.clone(),
                changesgenerate: Some(changes),
                outdir: Some(PathBuf::from("/out")),
                ..TaskConfig::default()
            };

            let list = generate(&Config::Single(raw), &TaskConfig::default()).unwrap();
            let task = &list.tasks[0];
            prop_assert_eq!(task.scm.as_str(), scm);
            prop_assert_eq!(&task.url, &url);
            prop_assert_eq!(&task.filename, &filename);
            prop_assert_eq!(&task.revision, &revision);
            prop_assert_eq!(&task.version_prefix, &prefix);
            prop_assert_eq!(task.changes_generate, changes);
            prop_assert_eq!(&task.outdir, &PathBuf::from("/out"));
        }
    }
}

//! # Configuration Parsing
//!
//! This module reads tar-scm configuration files. Two shapes are accepted:
//!
//! 1.  **Single task**: a flat mapping of task keys.
//!
//!     ```yaml
//!     scm: git
//!     url: https://github.com/example/project.git
//!     versionprefix: "1.0"
//!     changesgenerate: enable
//!     ```
//!
//! 2.  **Manifest**: a `parts:` mapping with one entry per source, plus
//!     top-level metadata (`name`, `summary`, `version`, `description`, ...)
//!     that is copied into the composite manifest.
//!
//!     ```yaml
//!     name: pipelinetest
//!     version: 1.0
//!     parts:
//!       libpipeline:
//!         plugin: autotools
//!         source: lp:~mterry/libpipeline/printf
//!         source-type: bzr
//!       kanku:
//!         plugin: make
//!         source: git@github.com:M0ses/kanku
//!         source-type: git
//!         after: [libpipeline]
//!     ```
//!
//! 3.  **AppImage recipe**: an `appimage.yml` whose `build:` section maps
//!     each scm to the repositories the image is built from. Every url
//!     becomes one task; all other recipe keys are ignored.
//!
//!     ```yaml
//!     app: QtQuickApp
//!     build:
//!       git:
//!         - https://github.com/probonopd/QtQuickApp.git
//!     ```
//!
//! Part entries accept the packaging aliases `source` (url), `source-type`
//! (scm), `source-commit`/`source-tag`/`source-branch` (revision) and keep
//! any key they do not recognise, so it can be copied into the manifest.
//!
//! Parsing only checks the shape of the file. Semantic validation (known
//! scm, unique filenames, resolvable dependencies) happens when the task
//! list is generated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Raw settings of one task, as written in a configuration file or given on
/// the command line. Unset fields fall back to the run defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskConfig {
    pub scm: Option<String>,
    pub url: Option<String>,
    pub revision: Option<String>,
    pub filename: Option<String>,
    pub outdir: Option<PathBuf>,
    pub clone_prefix: Option<String>,
    pub use_obs_scm: Option<bool>,
    pub version: Option<String>,
    pub versionformat: Option<String>,
    pub versionprefix: Option<String>,
    pub versionrewrite_pattern: Option<String>,
    pub versionrewrite_replacement: Option<String>,
    pub changesgenerate: Option<bool>,
    pub changesauthor: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub compression: Option<String>,
    pub after: Option<Vec<String>>,
    pub plugin: Option<String>,
    /// Keys with no meaning to tar-scm, kept for the manifest.
    pub extra: BTreeMap<String, Value>,
}

impl TaskConfig {
    /// Returns a copy of `self` with every unset field taken from `defaults`.
    pub fn merged_over(&self, defaults: &TaskConfig) -> TaskConfig {
        fn pick<T: Clone>(own: &Option<T>, fallback: &Option<T>) -> Option<T> {
            own.clone().or_else(|| fallback.clone())
        }

        let mut extra = defaults.extra.clone();
        extra.extend(self.extra.clone());

        TaskConfig {
            scm: pick(&self.scm, &defaults.scm),
            url: pick(&self.url, &defaults.url),
            revision: pick(&self.revision, &defaults.revision),
            filename: pick(&self.filename, &defaults.filename),
            outdir: pick(&self.outdir, &defaults.outdir),
            clone_prefix: pick(&self.clone_prefix, &defaults.clone_prefix),
            use_obs_scm: pick(&self.use_obs_scm, &defaults.use_obs_scm),
            version: pick(&self.version, &defaults.version),
            versionformat: pick(&self.versionformat, &defaults.versionformat),
            versionprefix: pick(&self.versionprefix, &defaults.versionprefix),
            versionrewrite_pattern: pick(
                &self.versionrewrite_pattern,
                &defaults.versionrewrite_pattern,
            ),
            versionrewrite_replacement: pick(
                &self.versionrewrite_replacement,
                &defaults.versionrewrite_replacement,
            ),
            changesgenerate: pick(&self.changesgenerate, &defaults.changesgenerate),
            changesauthor: pick(&self.changesauthor, &defaults.changesauthor),
            exclude: pick(&self.exclude, &defaults.exclude),
            compression: pick(&self.compression, &defaults.compression),
            after: pick(&self.after, &defaults.after),
            plugin: pick(&self.plugin, &defaults.plugin),
            extra,
        }
    }
}

/// A multi-source configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestConfig {
    /// Top-level keys other than `parts`, in sorted order.
    pub metadata: BTreeMap<String, Value>,
    /// Parts in declaration order.
    pub parts: Vec<(String, TaskConfig)>,
}

/// The `build:` section of an AppImage recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppImageBuild {
    pub git: Option<Vec<String>>,
    pub hg: Option<Vec<String>>,
    pub bzr: Option<Vec<String>>,
    pub svn: Option<Vec<String>>,
}

impl AppImageBuild {
    /// `(scm, url)` pairs, git first, then hg, bzr and svn.
    pub fn sources(&self) -> Vec<(&'static str, &str)> {
        [
            ("git", &self.git),
            ("hg", &self.hg),
            ("bzr", &self.bzr),
            ("svn", &self.svn),
        ]
        .into_iter()
        .flat_map(|(scm, urls)| {
            urls.iter()
                .flatten()
                .map(move |url| (scm, url.as_str()))
        })
        .collect()
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub enum Config {
    Single(TaskConfig),
    Manifest(ManifestConfig),
    AppImage(AppImageBuild),
}

impl Config {
    /// Human readable name of the configuration shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Config::Single(_) => "single task",
            Config::Manifest(_) => "manifest",
            Config::AppImage(_) => "appimage recipe",
        }
    }
}

/// Parses a YAML string into a `Config`.
pub fn parse(yaml_content: &str) -> Result<Config> {
    let value: Value = serde_yaml::from_str(yaml_content)?;

    let mut map = match value {
        Value::Mapping(map) => map,
        Value::Null => return Err(Error::config("Configuration is empty")),
        _ => {
            return Err(Error::config_with_hint(
                "Expected a YAML mapping at the top level",
                "Write either task keys (scm, url, ...) or a 'parts:' mapping",
            ))
        }
    };

    if let Some(parts) = map.remove(key("parts")) {
        return parse_manifest(map, parts).map(Config::Manifest);
    }
    match map.remove(key("build")) {
        Some(build) => parse_appimage_build(build).map(Config::AppImage),
        None => task_config_from_mapping(map, "configuration").map(Config::Single),
    }
}

/// Parse a `Config` from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

fn parse_manifest(top: Mapping, parts: Value) -> Result<ManifestConfig> {
    let parts = match parts {
        Value::Mapping(m) => m,
        _ => {
            return Err(Error::config_with_hint(
                "'parts' must be a mapping",
                "List each source as '<name>: {source: ..., source-type: ...}'",
            ))
        }
    };

    let mut metadata = BTreeMap::new();
    for (k, v) in top {
        metadata.insert(key_string(k, "top-level")?, v);
    }

    let mut parsed = Vec::with_capacity(parts.len());
    for (name, value) in parts {
        let name = key_string(name, "parts")?;
        let part = match value {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            _ => {
                return Err(Error::config(format!(
                    "Part '{}' must be a mapping",
                    name
                )))
            }
        };
        let config = task_config_from_mapping(part, &format!("part '{}'", name))?;
        parsed.push((name, config));
    }

    Ok(ManifestConfig {
        metadata,
        parts: parsed,
    })
}

fn parse_appimage_build(build: Value) -> Result<AppImageBuild> {
    if build.is_null() {
        return Ok(AppImageBuild::default());
    }
    serde_yaml::from_value(build).map_err(|e| {
        Error::config_with_hint(
            format!("Invalid 'build' section: {}", e),
            "Map each scm (git, hg, bzr, svn) to a list of repository urls",
        )
    })
}

/// Convert a YAML mapping to a `TaskConfig`, keeping unknown keys as extras.
fn task_config_from_mapping(mut map: Mapping, context: &str) -> Result<TaskConfig> {
    let mut config = TaskConfig {
        scm: take_string(&mut map, &["scm", "source-type"], context)?,
        url: take_string(&mut map, &["url", "source"], context)?,
        revision: take_string(
            &mut map,
            &["revision", "source-commit", "source-tag", "source-branch"],
            context,
        )?,
        filename: take_string(&mut map, &["filename"], context)?,
        outdir: take_string(&mut map, &["outdir"], context)?.map(PathBuf::from),
        clone_prefix: take_string(&mut map, &["clone_prefix", "clone-prefix"], context)?,
        use_obs_scm: take_bool(&mut map, &["use_obs_scm", "use-obs-scm"], context)?,
        version: take_string(&mut map, &["version"], context)?,
        versionformat: take_string(&mut map, &["versionformat"], context)?,
        versionprefix: take_string(&mut map, &["versionprefix"], context)?,
        versionrewrite_pattern: take_string(
            &mut map,
            &["versionrewrite_pattern", "versionrewrite-pattern"],
            context,
        )?,
        versionrewrite_replacement: take_string(
            &mut map,
            &["versionrewrite_replacement", "versionrewrite-replacement"],
            context,
        )?,
        changesgenerate: take_bool(&mut map, &["changesgenerate"], context)?,
        changesauthor: take_string(&mut map, &["changesauthor"], context)?,
        exclude: take_list(&mut map, &["exclude"], context)?,
        compression: take_string(&mut map, &["compression"], context)?,
        after: take_list(&mut map, &["after", "depends_on"], context)?,
        plugin: take_string(&mut map, &["plugin"], context)?,
        extra: BTreeMap::new(),
    };

    for (k, v) in map {
        config.extra.insert(key_string(k, context)?, v);
    }

    Ok(config)
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

fn key_string(k: Value, context: &str) -> Result<String> {
    match k {
        Value::String(s) => Ok(s),
        other => Err(Error::config(format!(
            "Keys in {} must be strings, found {:?}",
            context, other
        ))),
    }
}

/// Removes the first present alias from `map`. Setting two aliases of the
/// same field is an error.
fn take_value(map: &mut Mapping, aliases: &[&str], context: &str) -> Result<Option<(String, Value)>> {
    let mut found: Option<(String, Value)> = None;
    for alias in aliases {
        if let Some(value) = map.remove(key(alias)) {
            if let Some((first, _)) = &found {
                return Err(Error::config(format!(
                    "Both '{}' and '{}' are set in {}",
                    first, alias, context
                )));
            }
            found = Some((alias.to_string(), value));
        }
    }
    Ok(found)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn take_string(map: &mut Mapping, aliases: &[&str], context: &str) -> Result<Option<String>> {
    match take_value(map, aliases, context)? {
        None | Some((_, Value::Null)) => Ok(None),
        Some((name, value)) => scalar_string(&value).map(Some).ok_or_else(|| {
            Error::config(format!("'{}' in {} must be a string", name, context))
        }),
    }
}

fn take_bool(map: &mut Mapping, aliases: &[&str], context: &str) -> Result<Option<bool>> {
    match take_value(map, aliases, context)? {
        None | Some((_, Value::Null)) => Ok(None),
        Some((_, Value::Bool(b))) => Ok(Some(b)),
        Some((name, Value::String(s))) => match s.as_str() {
            "enable" | "true" | "yes" => Ok(Some(true)),
            "disable" | "false" | "no" => Ok(Some(false)),
            _ => Err(Error::config_with_hint(
                format!("'{}' in {} has invalid value '{}'", name, context, s),
                "Use enable or disable",
            )),
        },
        Some((name, _)) => Err(Error::config(format!(
            "'{}' in {} must be a boolean",
            name, context
        ))),
    }
}

fn take_list(map: &mut Mapping, aliases: &[&str], context: &str) -> Result<Option<Vec<String>>> {
    match take_value(map, aliases, context)? {
        None | Some((_, Value::Null)) => Ok(None),
        Some((name, Value::Sequence(items))) => items
            .iter()
            .map(|item| {
                scalar_string(item).ok_or_else(|| {
                    Error::config(format!("'{}' in {} must list strings", name, context))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some((name, value)) => scalar_string(&value)
            .map(|s| Some(vec![s]))
            .ok_or_else(|| Error::config(format!("'{}' in {} must be a list", name, context))),
    }
}

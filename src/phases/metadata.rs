//! Writing Package Metadata
//!
//! Two optional files accompany an archive:
//!
//! - **`<filename>.obsinfo`** (when `use_obs_scm` is set) records name,
//!   version, commit time and commit id, so a later build step can unpack
//!   the archive without asking the scm again.
//! - **`<filename>.changes`** (when `changes_generate` is set) receives a new
//!   changelog entry listing the recent commit subjects. The entry is
//!   prepended; older entries stay untouched.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::defaults;
use crate::error::{Error, Result};
use crate::scm::CommitInfo;
use crate::task::Task;

const CHANGES_SEPARATOR: &str =
    "-------------------------------------------------------------------";

/// Renders the `.obsinfo` content for `task`.
pub fn render_obsinfo(task: &Task, version: &str, info: &CommitInfo) -> String {
    let mut out = format!(
        "name: {}\nversion: {}\nmtime: {}\n",
        task.filename,
        version,
        info.timestamp.unwrap_or(0)
    );
    if let Some(commit) = &info.commit {
        out.push_str(&format!("commit: {}\n", commit));
    }
    out
}

pub fn write_obsinfo(task: &Task, version: &str, info: &CommitInfo) -> Result<PathBuf> {
    let path = task.obsinfo_path();
    fs::write(&path, render_obsinfo(task, version, info)).map_err(|e| {
        Error::packaging(format!("Failed to write '{}': {}", path.display(), e))
    })?;
    debug!("{}: wrote {}", task.filename, path.display());
    Ok(path)
}

/// Renders one changelog entry.
pub fn changes_entry(version: &str, author: &str, subjects: &[String], now: DateTime<Utc>) -> String {
    let mut entry = format!(
        "{}\n{} - {}\n\n",
        CHANGES_SEPARATOR,
        now.format("%a %b %d %H:%M:%S UTC %Y"),
        author
    );

    let title = if version.is_empty() {
        "- Update from upstream".to_string()
    } else {
        format!("- Update to version {}", version)
    };

    if subjects.is_empty() {
        entry.push_str(&title);
        entry.push('\n');
    } else {
        entry.push_str(&title);
        entry.push_str(":\n");
        for subject in subjects {
            entry.push_str(&format!("  * {}\n", subject));
        }
    }
    entry.push('\n');
    entry
}

/// Prepends a changelog entry for `version` to the task's `.changes` file.
///
/// Nothing is written when the newest entry already announces `version`.
pub fn write_changes(task: &Task, version: &str, info: &CommitInfo, now: DateTime<Utc>) -> Result<PathBuf> {
    let path = task.changes_path();
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(Error::packaging(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    if !version.is_empty() && newest_entry_version(&existing) == Some(version) {
        info!("{}: changes already list version {}", task.filename, version);
        return Ok(path);
    }

    let author = task
        .changes_author
        .as_deref()
        .unwrap_or(defaults::CHANGES_AUTHOR);
    let content = changes_entry(version, author, &info.subjects, now) + &existing;
    fs::write(&path, content).map_err(|e| {
        Error::packaging(format!("Failed to write '{}': {}", path.display(), e))
    })?;

    debug!("{}: updated {}", task.filename, path.display());
    Ok(path)
}

/// Version announced by the first entry of a `.changes` file.
fn newest_entry_version(changes: &str) -> Option<&str> {
    let first = changes
        .split(CHANGES_SEPARATOR)
        .find(|entry| !entry.trim().is_empty())?;
    first.lines().find_map(|line| {
        line.strip_prefix("- Update to version ")
            .map(|rest| rest.trim_end_matches(':').trim())
    })
}

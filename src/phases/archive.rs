//! Writing Source Archives
//!
//! Packs a checked-out working directory into `<filename>-<version>.tar[.gz]`
//! inside the task's output directory.
//!
//! ## Reproducibility
//!
//! Two runs over the same checkout produce byte-identical archives:
//!
//! - entries are added in sorted path order,
//! - every entry carries the commit timestamp as mtime (0 when the backend
//!   reports none) and uid/gid 0 with empty owner names,
//! - the gzip header carries no timestamp or file name.
//!
//! The backend's metadata directory (`.git`, `.hg`, ...) at the top of the
//! checkout and every path matching one of the task's exclude globs are left
//! out. All entries live below a single `<filename>-<version>/` directory.
//!
//! A failed write removes the partial archive.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use log::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::task::{Compression, Task};

/// Writes the archive of `task` for `version` and returns its path.
///
/// `mtime` is the commit timestamp in seconds since the epoch.
pub fn execute(task: &Task, workdir: &Path, version: &str, mtime: Option<i64>) -> Result<PathBuf> {
    let archive_path = task.archive_path(version);
    let basename = task.archive_basename(version);
    let mtime = mtime.filter(|t| *t >= 0).unwrap_or(0) as u64;

    let exclude = task
        .exclude
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let skip_dir = task.scm.metadata_dir();

    let entries = collect_entries(workdir, skip_dir, &exclude)?;
    debug!(
        "{}: packing {} entries into {}",
        task.filename,
        entries.len(),
        archive_path.display()
    );

    let result = write_archive(&archive_path, task.compression, &basename, workdir, &entries, mtime);
    if let Err(e) = result {
        let _ = fs::remove_file(&archive_path);
        return Err(match e {
            Error::Io(io) => Error::packaging(format!(
                "Failed to write archive '{}': {}",
                archive_path.display(),
                io
            )),
            other => other,
        });
    }

    info!("{}: wrote {}", task.filename, archive_path.display());
    Ok(archive_path)
}

/// Paths below `root`, relative to it, in sorted order.
fn collect_entries(root: &Path, skip_dir: &str, exclude: &[glob::Pattern]) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let is_metadata = entry.depth() == 1 && entry.file_name() == skip_dir;
            !is_metadata && !exclude.iter().any(|p| p.matches_path(rel))
        });

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        if let Ok(rel) = entry.path().strip_prefix(root) {
            entries.push(rel.to_path_buf());
        }
    }
    Ok(entries)
}

fn write_archive(
    archive_path: &Path,
    compression: Compression,
    basename: &str,
    root: &Path,
    entries: &[PathBuf],
    mtime: u64,
) -> Result<()> {
    let file = File::create(archive_path)?;
    match compression {
        Compression::None => {
            let mut builder = tar::Builder::new(file);
            append_entries(&mut builder, basename, root, entries, mtime)?;
            builder.into_inner()?.sync_all()?;
        }
        Compression::Gz => {
            let encoder = GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            append_entries(&mut builder, basename, root, entries, mtime)?;
            builder.into_inner()?.finish()?.sync_all()?;
        }
    }
    Ok(())
}

fn append_entries<W: Write>(
    builder: &mut tar::Builder<W>,
    basename: &str,
    root: &Path,
    entries: &[PathBuf],
    mtime: u64,
) -> Result<()> {
    let top = PathBuf::from(basename);
    let mut header = new_header(tar::EntryType::Directory, 0o755, mtime);
    builder.append_data(&mut header, &top, io::empty())?;

    for rel in entries {
        let path = root.join(rel);
        let name = top.join(rel);
        let meta = fs::symlink_metadata(&path)?;
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            let mut header = new_header(tar::EntryType::Symlink, 0o777, mtime);
            builder.append_link(&mut header, &name, &target)?;
        } else if file_type.is_dir() {
            let mut header = new_header(tar::EntryType::Directory, mode_of(&meta, 0o755), mtime);
            builder.append_data(&mut header, &name, io::empty())?;
        } else {
            let mut header = new_header(tar::EntryType::Regular, mode_of(&meta, 0o644), mtime);
            header.set_size(meta.len());
            builder.append_data(&mut header, &name, File::open(&path)?)?;
        }
    }

    Ok(())
}

fn new_header(entry_type: tar::EntryType, mode: u32, mtime: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(0);
    header
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata, _fallback: u32) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata, fallback: u32) -> u32 {
    fallback
}

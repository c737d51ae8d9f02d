//! Default values for tar-scm configuration.
//!
//! This module provides centralized default values used across the
//! generator, the packaging phases and the commands, ensuring consistency
//! and avoiding duplication.

use std::path::{Path, PathBuf};

/// Prefix of working directory names, keeping checkouts of tasks that share
/// an output directory apart.
pub const CLONE_PREFIX: &str = "_obs_";

/// File name of the composite manifest written to the output directory.
pub const MANIFEST_FILE: &str = "_service:snapcraft:snapcraft.yaml";

/// Author of generated changelog entries when none is configured.
pub const CHANGES_AUTHOR: &str = "tar-scm@invalid";

/// Configuration file looked up in the current directory when `--config`
/// is not given and no `--url` is passed.
pub const CONFIG_FILE: &str = "tar_scm.yaml";

/// AppImage recipe picked up when no `tar_scm.yaml` exists.
pub const APPIMAGE_FILE: &str = "appimage.yml";

/// Returns the first configuration file present in `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    [CONFIG_FILE, APPIMAGE_FILE]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Returns the default output directory.
///
/// This can be overridden by the `--outdir` CLI flag or the
/// `TAR_SCM_OUTDIR` environment variable.
pub fn default_outdir() -> PathBuf {
    PathBuf::from(".")
}

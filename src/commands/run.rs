//! Run command implementation
//!
//! The run command executes a complete tar-scm run:
//! 1. Load the configuration file, or build a single task from flags
//! 2. Generate and validate the task list
//! 3. Fetch, version and package every task in dependency order
//! 4. Write the composite manifest when every part succeeded
//! 5. Remove all working directories
//!
//! Flags double as defaults for every task of a configuration file; values
//! in the file win.

use anyhow::Result;
use clap::Args;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tar_scm::config::{self, Config, TaskConfig};
use tar_scm::defaults;
use tar_scm::generator;
use tar_scm::output::{emoji, task_line, OutputConfig};
use tar_scm::phases::Orchestrator;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to a tar-scm configuration file
    #[arg(short, long, value_name = "PATH", env = "TAR_SCM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory receiving archives, metadata and the manifest
    #[arg(short, long, value_name = "DIR", env = "TAR_SCM_OUTDIR")]
    pub outdir: Option<PathBuf>,

    /// Version control system (git, hg, bzr, svn)
    #[arg(long, value_name = "SCM")]
    pub scm: Option<String>,

    /// Repository to check out
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Revision, tag or branch to check out
    #[arg(long, value_name = "REV")]
    pub revision: Option<String>,

    /// Base name of the produced files
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Prefix of working directory names
    #[arg(long, value_name = "PREFIX")]
    pub clone_prefix: Option<String>,

    /// Write a .obsinfo file next to each archive
    #[arg(long)]
    pub use_obs_scm: bool,

    /// Version to use: _auto_ (detect), _none_ or a literal version
    #[arg(long = "set-version", value_name = "VERSION")]
    pub set_version: Option<String>,

    /// Backend-specific format of detected versions
    #[arg(long, value_name = "FORMAT")]
    pub versionformat: Option<String>,

    /// Prefix joined to the version with a '.'
    #[arg(long, value_name = "PREFIX")]
    pub versionprefix: Option<String>,

    /// Regex applied to the detected version
    #[arg(long, value_name = "REGEX")]
    pub versionrewrite_pattern: Option<String>,

    /// Replacement for versionrewrite-pattern (default \1)
    #[arg(long, value_name = "TEXT")]
    pub versionrewrite_replacement: Option<String>,

    /// Prepend a changelog entry to <filename>.changes
    #[arg(long)]
    pub changesgenerate: bool,

    /// Author of generated changelog entries
    #[arg(long, value_name = "EMAIL")]
    pub changesauthor: Option<String>,

    /// Glob of paths to leave out of archives (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Archive compression (gz, none)
    #[arg(long, value_name = "KIND")]
    pub compression: Option<String>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Task defaults expressed by the flags.
    pub fn task_defaults(&self) -> TaskConfig {
        TaskConfig {
            scm: self.scm.clone(),
            url: self.url.clone(),
            revision: self.revision.clone(),
            filename: self.filename.clone(),
            outdir: Some(self.outdir.clone().unwrap_or_else(defaults::default_outdir)),
            clone_prefix: self.clone_prefix.clone(),
            use_obs_scm: self.use_obs_scm.then_some(true),
            version: self.set_version.clone(),
            versionformat: self.versionformat.clone(),
            versionprefix: self.versionprefix.clone(),
            versionrewrite_pattern: self.versionrewrite_pattern.clone(),
            versionrewrite_replacement: self.versionrewrite_replacement.clone(),
            changesgenerate: self.changesgenerate.then_some(true),
            changesauthor: self.changesauthor.clone(),
            exclude: (!self.exclude.is_empty()).then(|| self.exclude.clone()),
            compression: self.compression.clone(),
            ..TaskConfig::default()
        }
    }
}

/// Loads the configuration named by the flags.
///
/// Without `--config`, a `--url` describes a single task on its own;
/// otherwise `tar_scm.yaml` or `appimage.yml` in the current directory is
/// used.
pub fn load_config(config: Option<&PathBuf>, url: Option<&str>) -> Result<Config> {
    let path = match (config, url) {
        (Some(path), _) => path.clone(),
        (None, Some(_)) => return Ok(Config::Single(TaskConfig::default())),
        (None, None) => defaults::find_config(Path::new("."))
            .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_FILE)),
    };

    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found: {} (pass --config or --url)",
            path.display()
        );
    }
    Ok(config::from_file(&path)?)
}

/// Execute the run command
pub fn execute(args: RunArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let start_time = Instant::now();

    let config = load_config(args.config.as_ref(), args.url.as_deref())?;
    let list = generator::generate(&config, &args.task_defaults())?;

    if !args.quiet {
        println!(
            "{} Packaging {} source(s)",
            emoji(&out, "📦", "[RUN]"),
            list.tasks.len()
        );
    }

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&cancel));

    let mut orchestrator = Orchestrator::with_cancellation(Arc::clone(&cancel));
    let report = orchestrator.run(&list)?;

    if !args.quiet {
        for task in &report.tasks {
            println!("   {}", task_line(&out, task));
        }
        if let Some(path) = &report.manifest {
            println!(
                "{} Manifest written to {}",
                emoji(&out, "📝", "[OK]"),
                path.display()
            );
        }
    }

    if let Some(e) = &report.manifest_error {
        anyhow::bail!("Failed to write manifest: {}", e);
    }

    if cancel.load(Ordering::SeqCst) {
        anyhow::bail!(
            "Interrupted, {} of {} task(s) did not complete",
            report.failed().count(),
            report.tasks.len()
        );
    }

    if report.has_failures() {
        let failed: Vec<&str> = report.failed().map(|r| r.filename.as_str()).collect();
        anyhow::bail!(
            "{} of {} task(s) did not succeed: {}",
            failed.len(),
            report.tasks.len(),
            failed.join(", ")
        );
    }

    if !args.quiet {
        println!(
            "{} Done in {:.2}s",
            emoji(&out, "✅", "[OK]"),
            start_time.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

/// Turns SIGINT and SIGTERM into a cancellation of the run, so that
/// working directories are still removed before the process exits.
fn install_interrupt_handler(cancel: Arc<AtomicBool>) {
    let result = ctrlc::set_handler(move || {
        if !cancel.swap(true, Ordering::SeqCst) {
            eprintln!("Interrupted, cleaning up...");
        }
    });
    if let Err(e) = result {
        warn!("cannot install interrupt handler: {}", e);
    }
}

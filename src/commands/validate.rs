//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks a
//! configuration file without running it.
//!
//! ## Functionality
//!
//! - **Parsing**: The file must be a single task, a `parts:` manifest or an
//!   AppImage recipe with a `build:` section.
//! - **Task Generation**: Every task must name a supported scm and a url,
//!   filenames must be unique, rewrite patterns and exclude globs must
//!   compile.
//! - **Dependencies**: Every `after` entry must name a part and the parts
//!   must not form a cycle. The resulting execution order is printed.
//!
//! No directory is created and no scm client is started.

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

use tar_scm::config::{self, TaskConfig};
use tar_scm::defaults;
use tar_scm::generator;
use tar_scm::output::{emoji, OutputConfig};
use tar_scm::phases::ordering;

/// Validate a tar-scm configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the configuration file to validate [default: tar_scm.yaml or appimage.yml]
    #[arg(short, long, value_name = "FILE", env = "TAR_SCM_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config_path = &args
        .config
        .or_else(|| defaults::find_config(Path::new(".")))
        .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_FILE));
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        config_path.display()
    );

    let config = match config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!(
                "{} Configuration parsing failed: {}",
                emoji(&out, "❌", "[ERR]"),
                e
            );
            return Err(anyhow::anyhow!("Configuration parsing failed: {}", e));
        }
    };

    let task_defaults = TaskConfig {
        outdir: Some(defaults::default_outdir()),
        ..TaskConfig::default()
    };
    let list = match generator::generate(&config, &task_defaults) {
        Ok(list) => list,
        Err(e) => {
            println!("{} {}", emoji(&out, "❌", "[ERR]"), e);
            return Err(anyhow::anyhow!("Configuration is invalid"));
        }
    };

    println!("\n{} Configuration Summary:", emoji(&out, "📊", "[INFO]"));
    println!("   Kind: {}", config.kind());
    println!("   Tasks: {}", list.tasks.len());

    println!("\n{} Execution order:", emoji(&out, "🔄", "[ORDER]"));
    for (position, index) in ordering::execution_order(&list.tasks)?.into_iter().enumerate() {
        let task = &list.tasks[index];
        let after = if task.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", task.depends_on.join(", "))
        };
        println!(
            "   {}. {} [{}] {}{}",
            position + 1,
            task.filename,
            task.scm,
            task.url,
            after
        );
    }

    println!("\n{} Configuration is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}

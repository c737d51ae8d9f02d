//! # Output Configuration
//!
//! Controls how the CLI prints run results: whether colors and emoji markers
//! are used, and how task outcomes are rendered.
//!
//! Color is decided once per invocation from the `--color=never|always|auto`
//! flag. In `auto` mode the usual environment conventions apply: `NO_COLOR`
//! (any value) and `CLICOLOR=0` turn colors off, `CLICOLOR_FORCE` turns them
//! on for non-terminals, and `TERM=dumb` turns them off.

use std::env;

use console::style;

use crate::task::{TaskOutcome, TaskReport};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Builds the configuration from the `--color` flag value.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => color_from_env().unwrap_or_else(|| {
                console::Term::stdout().features().colors_supported()
            }),
        };
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    pub fn colored() -> Self {
        Self { use_color: true }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Color preference expressed by the environment, if any.
fn color_from_env() -> Option<bool> {
    if env::var_os("NO_COLOR").is_some() {
        return Some(false);
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return Some(false);
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty() && v != "0") {
        return Some(true);
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return Some(false);
    }
    None
}

/// Picks the emoji or its plain-text stand-in.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// One result line for a task, e.g. `[OK] kanku 1.0 -> out/kanku-1.0.tar.gz`.
pub fn task_line(config: &OutputConfig, report: &TaskReport) -> String {
    let colored = config.use_color;
    match &report.outcome {
        TaskOutcome::Succeeded(success) => format!(
            "{} {} {} -> {}",
            emoji(config, "✅", "[OK]"),
            style(&report.filename).bold().force_styling(colored),
            if success.version.is_empty() {
                "(no version)".to_string()
            } else {
                success.version.clone()
            },
            success.archive_path.display()
        ),
        TaskOutcome::Failed(e) => format!(
            "{} {} {}",
            emoji(config, "❌", "[ERR]"),
            style(&report.filename).bold().force_styling(colored),
            style(e).red().force_styling(colored)
        ),
        TaskOutcome::Skipped { reason } => format!(
            "{} {} skipped: {}",
            emoji(config, "⏭️", "[SKIP]"),
            style(&report.filename).bold().force_styling(colored),
            style(reason).yellow().force_styling(colored)
        ),
        TaskOutcome::Pending => format!(
            "{} {} not run",
            emoji(config, "⏸️", "[PEND]"),
            report.filename
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::scm::Scm;
    use crate::task::{Task, TaskSuccess};
    use std::path::PathBuf;

    fn report() -> TaskReport {
        TaskReport::new(&Task::new(Scm::Git, "https://example.com/kanku.git", "kanku", "/out"))
    }

    #[test]
    fn test_color_flags() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(OutputConfig::from_env_and_flag("ALWAYS").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::colored(), "✅", "[OK]"), "✅");
        assert_eq!(emoji(&OutputConfig::plain(), "✅", "[OK]"), "[OK]");
    }

    #[test]
    fn test_task_line_success_plain() {
        let mut report = report();
        report.succeed(TaskSuccess {
            version: "1.0".to_string(),
            archive_path: PathBuf::from("/out/kanku-1.0.tar.gz"),
            obsinfo_path: None,
            changes_path: None,
        });
        assert_eq!(
            task_line(&OutputConfig::plain(), &report),
            "[OK] kanku 1.0 -> /out/kanku-1.0.tar.gz"
        );
    }

    #[test]
    fn test_task_line_failure_and_skip_plain() {
        let mut failed = report();
        failed.fail(Error::packaging("disk full"));
        assert_eq!(
            task_line(&OutputConfig::plain(), &failed),
            "[ERR] kanku Packaging error: disk full"
        );

        let mut skipped = report();
        skipped.skip("run cancelled");
        assert_eq!(
            task_line(&OutputConfig::plain(), &skipped),
            "[SKIP] kanku skipped: run cancelled"
        );
    }
}

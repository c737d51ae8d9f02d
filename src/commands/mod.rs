//! # CLI Command Implementations
//!
//! One file per subcommand of the `tar-scm` tool. Each holds a `clap`
//! derived `Args` struct and an `execute` function that calls into the
//! `tar_scm` library.

pub mod run;
pub mod validate;

//! # tar-scm
//!
//! Checks out version-control repositories, derives a release version for
//! each checkout and packs it into a reproducible source archive, ready to
//! be handed to a package build service. Several sources can be combined in
//! a composite manifest whose parts build after one another.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::PathBuf;
//! use tar_scm::config::{self, TaskConfig};
//! use tar_scm::generator;
//!
//! let config = config::parse(r#"
//! scm: git
//! url: https://github.com/openSUSE/obs-service-tar_scm.git
//! versionprefix: "1.0"
//! "#).unwrap();
//!
//! let defaults = TaskConfig {
//!     outdir: Some(PathBuf::from("/tmp/out")),
//!     ..TaskConfig::default()
//! };
//! let list = generator::generate(&config, &defaults).unwrap();
//! assert_eq!(list.tasks[0].filename, "obs-service-tar_scm");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: Parses a single flat task or a manifest
//!   with a `parts:` mapping.
//! - **Generation (`generator`)**: Turns a configuration into a validated
//!   list of [`task::Task`]s. Every configuration problem surfaces here,
//!   before any I/O.
//! - **Backends (`scm`)**: One [`scm::ScmBackend`] per supported system,
//!   driving its client binary.
//! - **Versions (`version`)**: Detection, regex rewrite and prefixing.
//! - **Phases (`phases`)**: Fetching, packaging and the manifest, driven by
//!   the [`phases::Orchestrator`].
//! - **Cleanup (`cleanup`)**: Guaranteed removal of working directories.

pub mod cleanup;
pub mod config;
pub mod defaults;
pub mod error;
pub mod generator;
pub mod output;
pub mod phases;
pub mod scm;
pub mod task;
pub mod version;

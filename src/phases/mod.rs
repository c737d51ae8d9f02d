//! The phases of a tar-scm run.
//!
//! ## Overview
//!
//! Every task of a run passes through the same phases:
//! 1. Ordering - Put dependencies before their dependents ([`ordering`])
//! 2. Fetching - Create the working directory and check the source out ([`fetch`])
//! 3. Version resolution - Detect and rewrite the version ([`crate::version`])
//! 4. Packaging - Write the archive ([`archive`]) and its metadata ([`metadata`])
//!
//! Once all tasks are through, a manifest run writes its composite
//! descriptor ([`manifest`]). The [`orchestrator`] drives the phases, keeps
//! per-task reports and owns the working directories until cleanup.

pub mod archive;
pub mod fetch;
pub mod manifest;
pub mod metadata;
pub mod orchestrator;
pub mod ordering;

pub use orchestrator::{Orchestrator, RunReport};

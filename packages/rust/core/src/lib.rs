//! Build registration for Bibliothek.
//!
//! This crate ties together artifact publication, catalog identity
//! resolution, changelog computation and build recording into the
//! end-to-end [`pipeline::register_build`] workflow.

pub mod changelog;
pub mod pipeline;
pub mod recorder;
pub mod resolver;

pub use changelog::compute_changes;
pub use pipeline::{ProgressReporter, RegisteredBuild, SilentProgress, register_build};
pub use recorder::record_build;
pub use resolver::{ResolvedIdentity, resolve_identity};

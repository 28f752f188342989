//! Artifact publication for recorded builds.
//!
//! This crate provides:
//! - [`mod@locate`]: glob-based lookup of exactly one local file per declaration
//! - [`blob`]: the [`BlobStore`] seam and its HTTP implementation
//! - [`publish`]: deterministic naming, SHA-256 digests and the [`Publisher`]

pub mod blob;
pub mod locate;
pub mod publish;

pub use blob::{BlobPath, BlobStore, HttpBlobStore};
pub use locate::{locate, locate_one};
pub use publish::{ArtifactTarget, PublishedArtifact, Publisher, published_file_name, sha256_hex};

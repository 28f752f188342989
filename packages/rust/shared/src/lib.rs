//! Shared types, error model, and configuration for Bibliothek.
//!
//! This crate is the foundation depended on by all other Bibliothek crates.
//! It provides:
//! - [`BibliothekError`]: the unified error type
//! - Catalog domain types ([`Build`], [`ArtifactManifest`], [`ChangeEntry`], ids)
//! - Configuration ([`InsertConfig`], document loading, environment layering)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ArtifactDeclaration, CONFIG_FILE_NAME, ConfigDocument, DEFAULT_BLOB_STORE_URL,
    DownloadConfig, InsertConfig, MatchOptions, load_config, load_document, resolve_config,
};
pub use error::{BibliothekError, Result};
pub use types::{
    ArtifactManifest, ArtifactRef, ArtifactType, Build, BuildChannel, BuildId, ChangeEntry,
    Project, ProjectId, Version, VersionGroupId, VersionId,
};

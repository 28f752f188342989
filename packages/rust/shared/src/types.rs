//! Core domain types for the build catalog.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BibliothekError, Result};

// ---------------------------------------------------------------------------
// Catalog identifiers
// ---------------------------------------------------------------------------

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

catalog_id!(
    /// Identifier of a [`Project`] record.
    ProjectId
);
catalog_id!(
    /// Identifier of a version group record.
    VersionGroupId
);
catalog_id!(
    /// Identifier of a version record.
    VersionId
);
catalog_id!(
    /// Identifier of a [`Build`] record.
    BuildId
);

// ---------------------------------------------------------------------------
// BuildChannel
// ---------------------------------------------------------------------------

/// Stability classification of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildChannel {
    #[default]
    Default,
    Experimental,
}

impl BuildChannel {
    /// Wire name as stored in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Experimental => "EXPERIMENTAL",
        }
    }
}

impl std::fmt::Display for BuildChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildChannel {
    type Err = BibliothekError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DEFAULT" => Ok(Self::Default),
            "EXPERIMENTAL" => Ok(Self::Experimental),
            other => Err(BibliothekError::config(format!(
                "unknown build channel '{other}': expected DEFAULT or EXPERIMENTAL"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Artifact type key used in a build's `downloads` map.
///
/// The first `.` of a declared type is replaced by `:` because consumers
/// address download entries by dotted paths. Stored keys are taken as is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactType(String);

impl ArtifactType {
    /// Normalize and validate a raw artifact type.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BibliothekError::validation("artifact type must not be empty"));
        }
        Ok(Self(trimmed.replacen('.', ":", 1)))
    }

    /// Validate an already-normalized key, as read back from the catalog.
    fn from_stored(raw: String) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(BibliothekError::validation("artifact type must not be empty"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactType {
    type Error = BibliothekError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_stored(value)
    }
}

impl From<ArtifactType> for String {
    fn from(value: ArtifactType) -> Self {
        value.0
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published artifact: its filename in the blob store and SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Published filename (not the full URL).
    pub name: String,
    /// Lowercase hex SHA-256 of the uploaded bytes.
    pub sha256: String,
}

/// Mapping from artifact type to the single artifact published for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactManifest(BTreeMap<ArtifactType, ArtifactRef>);

impl ArtifactManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Each artifact type may appear only once.
    pub fn insert(&mut self, artifact_type: ArtifactType, artifact: ArtifactRef) -> Result<()> {
        if self.0.contains_key(&artifact_type) {
            return Err(BibliothekError::validation(format!(
                "artifact type '{artifact_type}' is already present in the manifest"
            )));
        }
        self.0.insert(artifact_type, artifact);
        Ok(())
    }

    pub fn get(&self, artifact_type: &ArtifactType) -> Option<&ArtifactRef> {
        self.0.get(artifact_type)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactType, &ArtifactRef)> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Changelog
// ---------------------------------------------------------------------------

/// One source-control revision included in a build's changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Full commit hash.
    pub commit: String,
    /// Subject line.
    pub summary: String,
    /// Full raw commit message.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// A project as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub friendly_name: String,
}

/// A version as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub project_id: ProjectId,
    /// Group bound at creation time; never updated.
    pub version_group_id: VersionGroupId,
    pub name: String,
}

/// An immutable build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub project_id: ProjectId,
    pub version_id: VersionId,
    /// Caller-supplied build number. Not unique.
    pub number: u32,
    pub time: DateTime<Utc>,
    /// Newest first.
    pub changes: Vec<ChangeEntry>,
    pub downloads: ArtifactManifest,
    pub promoted: bool,
    pub channel: BuildChannel,
}

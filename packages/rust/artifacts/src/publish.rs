//! Artifact publication: locate, digest, upload, record in the manifest.

use std::path::PathBuf;

use bibliothek_shared::{
    ArtifactDeclaration, ArtifactManifest, ArtifactRef, ArtifactType, BibliothekError, Result,
};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::blob::{BlobPath, BlobStore};
use crate::locate::locate_one;

/// Characters that make an artifact name qualifier-style (`-name`) rather
/// than extension-style (`.name`).
const NAME_SEPARATORS: &[char] = &['.', '-'];

/// The build an artifact is published for.
#[derive(Debug, Clone)]
pub struct ArtifactTarget {
    pub project_name: String,
    pub version_name: String,
    pub build_number: u32,
}

/// Outcome of publishing one declaration.
#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    pub artifact_type: ArtifactType,
    pub artifact: ArtifactRef,
    /// Local file that was uploaded.
    pub source: PathBuf,
    /// Where it was stored.
    pub blob_path: BlobPath,
}

/// Published filename for an artifact of a build.
///
/// `jar` gives `foo-1.0-5.jar`; a name containing `.` or `-` is appended
/// with a dash instead, so `installer-win` gives `foo-1.0-5-installer-win`.
pub fn published_file_name(target: &ArtifactTarget, artifact_name: &str) -> String {
    let stem = format!(
        "{}-{}-{}",
        target.project_name, target.version_name, target.build_number
    );
    if artifact_name.contains(NAME_SEPARATORS) {
        format!("{stem}-{artifact_name}")
    } else {
        format!("{stem}.{artifact_name}")
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Publishes declared artifacts of one build to a blob store.
pub struct Publisher<'a, S> {
    store: &'a S,
    target: ArtifactTarget,
}

impl<'a, S: BlobStore> Publisher<'a, S> {
    pub fn new(store: &'a S, target: ArtifactTarget) -> Self {
        Self { store, target }
    }

    /// Publish a single declaration.
    #[instrument(skip_all, fields(pattern = %declaration.pattern, artifact_type = %declaration.artifact_type))]
    pub async fn publish(&self, declaration: &ArtifactDeclaration) -> Result<PublishedArtifact> {
        let pattern = declaration.pattern.clone();
        let options = declaration.options.clone();
        let source = tokio::task::spawn_blocking(move || locate_one(&pattern, &options))
            .await
            .map_err(|e| BibliothekError::io(&declaration.pattern, std::io::Error::other(e)))??;
        info!(path = %source.display(), "matched artifact");

        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| BibliothekError::io(&source, e))?;
        let sha256 = sha256_hex(&bytes);

        let file_name = published_file_name(&self.target, &declaration.name);
        let blob_path = BlobPath::for_artifact(
            &self.target.project_name,
            &self.target.version_name,
            self.target.build_number,
            &file_name,
        );

        info!(target_path = %blob_path, %sha256, bytes = bytes.len(), "publishing artifact");
        self.store.put(&blob_path, bytes).await?;

        Ok(PublishedArtifact {
            artifact_type: declaration.artifact_type.clone(),
            artifact: ArtifactRef {
                name: file_name,
                sha256,
            },
            source,
            blob_path,
        })
    }

    /// Publish every declaration in order and collect the manifest.
    ///
    /// Stops at the first failure; artifacts uploaded before it stay in
    /// the store.
    pub async fn publish_all(
        &self,
        declarations: &[ArtifactDeclaration],
        mut on_published: impl FnMut(&PublishedArtifact),
    ) -> Result<ArtifactManifest> {
        let mut manifest = ArtifactManifest::new();
        for declaration in declarations {
            let published = self.publish(declaration).await?;
            on_published(&published);
            manifest.insert(published.artifact_type, published.artifact)?;
        }
        Ok(manifest)
    }
}

//! End-to-end `insert` pipeline: publish -> resolve -> changelog -> record.

use std::time::{Duration, Instant};

use bibliothek_artifacts::{ArtifactTarget, BlobStore, PublishedArtifact, Publisher};
use bibliothek_catalog::Catalog;
use bibliothek_changelog::ChangeSource;
use bibliothek_shared::{ArtifactManifest, BuildId, ChangeEntry, InsertConfig, Result};
use tracing::{info, instrument, warn};

use crate::changelog::compute_changes;
use crate::recorder::record_build;
use crate::resolver::{ResolvedIdentity, resolve_identity};

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegisteredBuild {
    pub build_id: BuildId,
    pub identity: ResolvedIdentity,
    pub number: u32,
    /// Newest first.
    pub changes: Vec<ChangeEntry>,
    pub downloads: ArtifactManifest,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each artifact upload.
    fn artifact_published(&self, artifact: &PublishedArtifact, current: usize, total: usize);
    /// Called when the build has been recorded.
    fn done(&self, result: &RegisteredBuild);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn artifact_published(&self, _artifact: &PublishedArtifact, _current: usize, _total: usize) {}
    fn done(&self, _result: &RegisteredBuild) {}
}

/// Register one build.
///
/// 1. Publish every declared artifact (any failure aborts before the
///    catalog is touched)
/// 2. Resolve project, version group and version
/// 3. Compute the changelog since the previous build
/// 4. Record the build
///
/// The catalog connection is held only for steps 2-4.
#[instrument(skip_all, fields(
    project = %config.project_name,
    version = %config.version_name,
    build = config.build_number
))]
pub async fn register_build<S, C>(
    config: &InsertConfig,
    store: &S,
    source: &C,
    progress: &dyn ProgressReporter,
) -> Result<RegisteredBuild>
where
    S: BlobStore,
    C: ChangeSource,
{
    let start = Instant::now();
    info!(artifacts = config.downloads.len(), "starting build registration");

    // --- Phase 1: Artifacts ---
    progress.phase("Publishing artifacts");
    let publisher = Publisher::new(
        store,
        ArtifactTarget {
            project_name: config.project_name.clone(),
            version_name: config.version_name.clone(),
            build_number: config.build_number,
        },
    );
    let total = config.downloads.len();
    let mut current = 0;
    let downloads = publisher
        .publish_all(&config.downloads, |artifact| {
            current += 1;
            progress.artifact_published(artifact, current, total);
        })
        .await?;
    if downloads.is_empty() {
        warn!("no artifacts declared, recording build without downloads");
    }

    // --- Phase 2: Catalog ---
    progress.phase("Resolving catalog identity");
    let (identity, changes, build_id) = Catalog::scoped(&config.catalog_url, async |catalog| {
        let identity = resolve_identity(
            catalog,
            &config.project_name,
            &config.project_friendly_name,
            &config.version_group_name,
            &config.version_name,
        )
        .await?;

        progress.phase("Reading changelog");
        let changes =
            compute_changes(catalog, source, identity.project_id, identity.version_id).await?;

        progress.phase("Recording build");
        let build_id = record_build(
            catalog,
            &identity,
            config.build_number,
            config.build_channel,
            &downloads,
            &changes,
        )
        .await?;

        Ok((identity, changes, build_id))
    })
    .await?;

    let result = RegisteredBuild {
        build_id,
        identity,
        number: config.build_number,
        changes,
        downloads,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        build_id = %result.build_id,
        project_id = %result.identity.project_id,
        version_group_id = %result.identity.version_group_id,
        version_id = %result.identity.version_id,
        number = result.number,
        channel = %config.build_channel,
        changes = result.changes.len(),
        downloads = result.downloads.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "inserted build"
    );

    Ok(result)
}

//! Appending build records.

use bibliothek_catalog::{Catalog, NewBuild};
use bibliothek_shared::{ArtifactManifest, BuildChannel, BuildId, ChangeEntry, Result};
use tracing::debug;

use crate::resolver::ResolvedIdentity;

/// Insert a new, unpromoted build. The build number is not checked for
/// uniqueness.
pub async fn record_build(
    catalog: &Catalog,
    identity: &ResolvedIdentity,
    number: u32,
    channel: BuildChannel,
    downloads: &ArtifactManifest,
    changes: &[ChangeEntry],
) -> Result<BuildId> {
    let id = catalog
        .insert_build(&NewBuild {
            project_id: identity.project_id,
            version_id: identity.version_id,
            number,
            channel,
            changes,
            downloads,
        })
        .await?;

    debug!(build_id = %id, number, %channel, "recorded build");
    Ok(id)
}

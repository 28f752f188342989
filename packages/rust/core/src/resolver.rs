//! Catalog identity resolution: project, version group, version.

use bibliothek_catalog::Catalog;
use bibliothek_shared::{ProjectId, Result, VersionGroupId, VersionId};
use tracing::{debug, warn};

/// Ids of the catalog entities a build is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub project_id: ProjectId,
    /// Group the version is bound to, which may differ from the group
    /// named in this run when the version already existed.
    pub version_group_id: VersionGroupId,
    pub version_id: VersionId,
}

/// Upsert the project, version group and version, in that order.
///
/// Each step is atomic on its own; the three together are not.
pub async fn resolve_identity(
    catalog: &Catalog,
    project_name: &str,
    friendly_name: &str,
    version_group_name: &str,
    version_name: &str,
) -> Result<ResolvedIdentity> {
    let project_id = catalog.upsert_project(project_name, friendly_name).await?;
    let group_id = catalog
        .upsert_version_group(project_id, version_group_name)
        .await?;
    let version = catalog
        .upsert_version(project_id, group_id, version_name)
        .await?;

    if version.version_group_id != group_id {
        warn!(
            version = version_name,
            requested_group = version_group_name,
            bound_group = %version.version_group_id,
            "version already belongs to another group, keeping the original"
        );
    }

    let identity = ResolvedIdentity {
        project_id,
        version_group_id: version.version_group_id,
        version_id: version.id,
    };
    debug!(
        project_id = %identity.project_id,
        version_group_id = %identity.version_group_id,
        version_id = %identity.version_id,
        "resolved catalog identity"
    );
    Ok(identity)
}

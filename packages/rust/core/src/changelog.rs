//! Changelog for a new build: commits since the last recorded one.

use bibliothek_catalog::Catalog;
use bibliothek_changelog::{ChangeSource, CommitRange};
use bibliothek_shared::{ChangeEntry, ProjectId, Result, VersionId};
use tracing::{debug, instrument};

/// Commits made since the newest commit of the last build of this version.
///
/// Without a previous build, or when it recorded no changes, only `HEAD`
/// itself is reported.
#[instrument(skip_all, fields(%project_id, %version_id))]
pub async fn compute_changes<C: ChangeSource>(
    catalog: &Catalog,
    source: &C,
    project_id: ProjectId,
    version_id: VersionId,
) -> Result<Vec<ChangeEntry>> {
    let last_build = catalog.latest_build(project_id, version_id).await?;
    let last_commit = last_build
        .as_ref()
        .and_then(|build| build.changes.first())
        .map(|change| change.commit.as_str());

    let range = CommitRange::after(last_commit);
    debug!(
        %range,
        previous_build = last_build.as_ref().map(|b| b.number),
        "computing changelog"
    );

    source.changes(&range).await
}

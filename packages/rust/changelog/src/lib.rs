//! Git history reader for build changelogs.
//!
//! A [`CommitRange`] names the commits between a previously recorded commit
//! (exclusive) and `HEAD` (inclusive). [`GitHistory`] lists them newest
//! first by commit time, like `git log`, reading the repository with `gix`
//! on the blocking pool.

use std::future::Future;
use std::path::{Path, PathBuf};

use bibliothek_shared::{BibliothekError, ChangeEntry, Result};
use tracing::{debug, instrument};

/// Revision used when there is no previously recorded commit.
pub const FALLBACK_SINCE: &str = "HEAD^1";

/// A `since..until` commit range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    pub since: String,
    pub until: String,
}

impl CommitRange {
    /// Commits after `since` up to and including `HEAD`.
    pub fn since(since: impl Into<String>) -> Self {
        Self {
            since: since.into(),
            until: "HEAD".to_string(),
        }
    }

    /// Range starting at the last recorded commit, or only `HEAD` itself
    /// when nothing was recorded yet.
    pub fn after(last_commit: Option<&str>) -> Self {
        Self::since(last_commit.unwrap_or(FALLBACK_SINCE))
    }
}

impl std::fmt::Display for CommitRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.since, self.until)
    }
}

/// Source of commit history.
pub trait ChangeSource {
    /// Commits in `range`, newest first.
    fn changes(&self, range: &CommitRange) -> impl Future<Output = Result<Vec<ChangeEntry>>> + Send;
}

/// Reads history from a git repository on disk.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repository: PathBuf,
}

impl GitHistory {
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
        }
    }
}

impl ChangeSource for GitHistory {
    #[instrument(skip_all, fields(range = %range))]
    async fn changes(&self, range: &CommitRange) -> Result<Vec<ChangeEntry>> {
        let repository = self.repository.clone();
        let owned = range.clone();
        let changes = tokio::task::spawn_blocking(move || read_range(&repository, &owned))
            .await
            .map_err(|e| {
                BibliothekError::changelog_range(range.to_string(), format!("history reader failed: {e}"))
            })??;

        debug!(count = changes.len(), "read commit range");
        Ok(changes)
    }
}

fn read_range(repository: &Path, range: &CommitRange) -> Result<Vec<ChangeEntry>> {
    let fail = |message: String| BibliothekError::changelog_range(range.to_string(), message);

    let repo = gix::open(repository)
        .map_err(|e| fail(format!("cannot open repository {}: {e}", repository.display())))?;
    let until = resolve_commit(&repo, &range.until).map_err(&fail)?;
    let since = resolve_commit(&repo, &range.since).map_err(&fail)?;

    let walk = repo
        .rev_walk([until])
        .with_hidden([since])
        .sorting(gix::revision::walk::Sorting::ByCommitTime(Default::default()))
        .all()
        .map_err(|e| fail(format!("cannot walk history: {e}")))?;

    let mut changes = Vec::new();
    for info in walk {
        let info = info.map_err(|e| fail(format!("cannot walk history: {e}")))?;
        let commit = info
            .object()
            .map_err(|e| fail(format!("cannot read commit {}: {e}", info.id)))?;
        let message = commit
            .message_raw()
            .map_err(|e| fail(format!("cannot decode commit {}: {e}", commit.id)))?;
        let summary = commit
            .message()
            .map_err(|e| fail(format!("cannot decode commit {}: {e}", commit.id)))?
            .summary();

        changes.push(ChangeEntry {
            commit: commit.id.to_string(),
            summary: summary.to_string(),
            message: message.to_string().trim_end().to_string(),
        });
    }
    Ok(changes)
}

/// Resolve a revision and peel it to a commit.
fn resolve_commit(repo: &gix::Repository, revision: &str) -> std::result::Result<gix::ObjectId, String> {
    let peeled = format!("{revision}^{{commit}}");
    repo.rev_parse_single(peeled.as_str())
        .map(|id| id.detach())
        .map_err(|e| format!("cannot resolve '{revision}': {e}"))
}

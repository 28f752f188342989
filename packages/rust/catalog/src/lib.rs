//! libSQL catalog store for projects, versions and builds.
//!
//! The [`Catalog`] struct wraps a libSQL database, either an embedded file or
//! a remote libSQL server, selected by connection string:
//! - `path/to/catalog.db` or `file:path/to/catalog.db`: embedded database
//! - `libsql://host?authToken=...` or `https://host?authToken=...`: remote
//!
//! Identity tables are upsert-only; `builds` is append-only.

mod migrations;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bibliothek_shared::{
    ArtifactManifest, BibliothekError, Build, BuildChannel, BuildId, ChangeEntry, Project,
    ProjectId, Result, Version, VersionGroupId, VersionId,
};
use chrono::Utc;
use libsql::{Connection, Database, params};
use url::Url;

/// Where a catalog lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    /// Embedded database file.
    Local(PathBuf),
    /// Remote libSQL server.
    Remote { url: String, auth_token: String },
}

impl CatalogLocation {
    /// Parse a connection string.
    pub fn parse(connection: &str) -> Result<Self> {
        let connection = connection.trim();
        if connection.is_empty() {
            return Err(BibliothekError::config("catalog connection string is empty"));
        }

        if let Some(path) = connection.strip_prefix("file:") {
            let path = path.strip_prefix("//").unwrap_or(path);
            return Ok(Self::Local(PathBuf::from(path)));
        }

        match Url::parse(connection) {
            Ok(url) if matches!(url.scheme(), "libsql" | "http" | "https" | "ws" | "wss") => {
                let auth_token = url
                    .query_pairs()
                    .find(|(key, _)| key == "authToken")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                let mut url = url;
                url.set_query(None);
                Ok(Self::Remote {
                    url: url.to_string(),
                    auth_token,
                })
            }
            // A one-letter scheme is a Windows drive (`C:\...`), not a URL.
            Ok(url) if url.scheme().len() > 1 => Err(BibliothekError::config(format!(
                "unsupported catalog scheme '{}': expected a file path, file:, libsql://, http(s):// or ws(s)://",
                url.scheme()
            ))),
            _ => Ok(Self::Local(PathBuf::from(connection))),
        }
    }
}

/// A build about to be appended to the catalog.
#[derive(Debug, Clone)]
pub struct NewBuild<'a> {
    pub project_id: ProjectId,
    pub version_id: VersionId,
    pub number: u32,
    pub channel: BuildChannel,
    pub changes: &'a [ChangeEntry],
    pub downloads: &'a ArtifactManifest,
}

/// Catalog handle wrapping a libSQL database.
pub struct Catalog {
    db: Database,
    conn: Connection,
    remote: bool,
}

impl Catalog {
    /// Connect to the catalog named by `connection` and apply migrations.
    pub async fn connect(connection: &str) -> Result<Self> {
        match CatalogLocation::parse(connection)? {
            CatalogLocation::Local(path) => Self::open(&path).await,
            CatalogLocation::Remote { url, auth_token } => {
                let db = libsql::Builder::new_remote(url.clone(), auth_token)
                    .build()
                    .await
                    .map_err(db_err)?;
                let conn = db.connect().map_err(db_err)?;
                tracing::debug!(%url, "connected to remote catalog");

                let catalog = Self {
                    db,
                    conn,
                    remote: true,
                };
                catalog.run_migrations().await?;
                Ok(catalog)
            }
        }
    }

    /// Open or create an embedded catalog at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BibliothekError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;
        tracing::debug!(?path, "opened local catalog");

        let catalog = Self {
            db,
            conn,
            remote: false,
        };
        catalog.run_migrations().await?;
        Ok(catalog)
    }

    /// Run `body` with a catalog connected for exactly its duration.
    ///
    /// The connection is closed on every exit path. A failure to close is
    /// logged and never replaces the body's own result.
    pub async fn scoped<T>(
        connection: &str,
        body: impl AsyncFnOnce(&Catalog) -> Result<T>,
    ) -> Result<T> {
        let catalog = Self::connect(connection).await?;
        let result = body(&catalog).await;

        if let Err(e) = catalog.close().await {
            tracing::warn!(error = %e, "error while closing catalog connection");
        }

        result
    }

    /// Release the connection. Local databases get `PRAGMA optimize` first.
    pub async fn close(self) -> Result<()> {
        if !self.remote {
            self.conn
                .execute_batch("PRAGMA optimize;")
                .await
                .map_err(db_err)?;
        }
        drop(self.conn);
        drop(self.db);
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        BibliothekError::Catalog(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Identity upserts
    // -----------------------------------------------------------------------

    /// Insert the project if absent and return its id. `friendly_name` is
    /// only written on insert.
    pub async fn upsert_project(&self, name: &str, friendly_name: &str) -> Result<ProjectId> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO projects (id, name, friendly_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![ProjectId::new().to_string(), name, friendly_name, now.as_str()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => parse_column(&row, 0),
            None => Err(BibliothekError::Catalog(format!(
                "upsert of project '{name}' returned no row"
            ))),
        }
    }

    /// Insert the version group if absent and return its id.
    pub async fn upsert_version_group(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<VersionGroupId> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO version_groups (id, project_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(project_id, name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![
                    VersionGroupId::new().to_string(),
                    project_id.to_string(),
                    name,
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => parse_column(&row, 0),
            None => Err(BibliothekError::Catalog(format!(
                "upsert of version group '{name}' returned no row"
            ))),
        }
    }

    /// Insert the version if absent and return it. An existing version keeps
    /// the group it was created with.
    pub async fn upsert_version(
        &self,
        project_id: ProjectId,
        version_group_id: VersionGroupId,
        name: &str,
    ) -> Result<Version> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "INSERT INTO versions (id, project_id, version_group_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(project_id, name) DO UPDATE SET name = excluded.name
                 RETURNING id, version_group_id",
                params![
                    VersionId::new().to_string(),
                    project_id.to_string(),
                    version_group_id.to_string(),
                    name,
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Version {
                id: parse_column(&row, 0)?,
                project_id,
                version_group_id: parse_column(&row, 1)?,
                name: name.to_string(),
            }),
            None => Err(BibliothekError::Catalog(format!(
                "upsert of version '{name}' returned no row"
            ))),
        }
    }

    /// Look up a project by its unique name.
    pub async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, friendly_name FROM projects WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(Project {
                id: parse_column(&row, 0)?,
                name: row.get::<String>(1).map_err(db_err)?,
                friendly_name: row.get::<String>(2).map_err(db_err)?,
            })),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Builds
    // -----------------------------------------------------------------------

    /// Append a build record. Returns the new build's id.
    ///
    /// Build numbers are not checked for uniqueness.
    pub async fn insert_build(&self, build: &NewBuild<'_>) -> Result<BuildId> {
        let id = BuildId::new();
        let now = Utc::now().to_rfc3339();
        let changes_json = serde_json::to_string(build.changes)
            .map_err(|e| BibliothekError::Catalog(format!("failed to encode changes: {e}")))?;
        let downloads_json = serde_json::to_string(build.downloads)
            .map_err(|e| BibliothekError::Catalog(format!("failed to encode downloads: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO builds (id, project_id, version_id, number, time, changes_json, downloads_json, promoted, channel)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                params![
                    id.to_string(),
                    build.project_id.to_string(),
                    build.version_id.to_string(),
                    i64::from(build.number),
                    now.as_str(),
                    changes_json,
                    downloads_json,
                    build.channel.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Most recently inserted build for a project version.
    pub async fn latest_build(
        &self,
        project_id: ProjectId,
        version_id: VersionId,
    ) -> Result<Option<Build>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, project_id, version_id, number, time, changes_json, downloads_json, promoted, channel
                 FROM builds WHERE project_id = ?1 AND version_id = ?2
                 ORDER BY seq DESC LIMIT 1",
                params![project_id.to_string(), version_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_build(&row)?)),
            None => Ok(None),
        }
    }

    /// All builds of a project version, oldest first.
    pub async fn list_builds(
        &self,
        project_id: ProjectId,
        version_id: VersionId,
    ) -> Result<Vec<Build>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, project_id, version_id, number, time, changes_json, downloads_json, promoted, channel
                 FROM builds WHERE project_id = ?1 AND version_id = ?2
                 ORDER BY seq",
                params![project_id.to_string(), version_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_build(&row)?);
        }
        Ok(results)
    }
}

fn db_err(e: libsql::Error) -> BibliothekError {
    BibliothekError::Catalog(e.to_string())
}

/// Read a text column and parse it.
fn parse_column<T>(row: &libsql::Row, idx: i32) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx).map_err(db_err)?;
    raw.parse::<T>().map_err(|e| {
        BibliothekError::validation(format!("invalid value '{raw}' in column {idx}: {e}"))
    })
}

/// Convert a database row to a [`Build`].
fn row_to_build(row: &libsql::Row) -> Result<Build> {
    let number: i64 = row.get(3).map_err(db_err)?;
    let time: String = row.get(4).map_err(db_err)?;
    let changes_json: String = row.get(5).map_err(db_err)?;
    let downloads_json: String = row.get(6).map_err(db_err)?;
    let promoted: i64 = row.get(7).map_err(db_err)?;

    Ok(Build {
        id: parse_column(row, 0)?,
        project_id: parse_column(row, 1)?,
        version_id: parse_column(row, 2)?,
        number: u32::try_from(number).map_err(|e| {
            BibliothekError::validation(format!("invalid build number {number}: {e}"))
        })?,
        time: chrono::DateTime::parse_from_rfc3339(&time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| BibliothekError::validation(format!("invalid date: {e}")))?,
        changes: serde_json::from_str(&changes_json)
            .map_err(|e| BibliothekError::validation(format!("invalid changes: {e}")))?,
        downloads: serde_json::from_str(&downloads_json)
            .map_err(|e| BibliothekError::validation(format!("invalid downloads: {e}")))?,
        promoted: promoted != 0,
        channel: parse_column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibliothek_shared::{ArtifactRef, ArtifactType};
    use uuid::Uuid;

    /// Create a temp file catalog for testing.
    async fn test_catalog() -> Catalog {
        let tmp = std::env::temp_dir().join(format!("bibliothek_test_{}.db", Uuid::now_v7()));
        Catalog::open(&tmp).await.expect("open test db")
    }

    async fn count_rows(catalog: &Catalog, table: &str) -> i64 {
        let mut rows = catalog
            .conn
            .query(&format!("SELECT COUNT(*) FROM {table}"), params![])
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    fn change(commit: &str) -> ChangeEntry {
        ChangeEntry {
            commit: commit.into(),
            summary: format!("summary {commit}"),
            message: format!("summary {commit}\n\nbody"),
        }
    }

    #[test]
    fn parses_connection_strings() {
        assert_eq!(
            CatalogLocation::parse("file:/var/lib/catalog.db").unwrap(),
            CatalogLocation::Local(PathBuf::from("/var/lib/catalog.db"))
        );
        assert_eq!(
            CatalogLocation::parse("catalog.db").unwrap(),
            CatalogLocation::Local(PathBuf::from("catalog.db"))
        );
        assert_eq!(
            CatalogLocation::parse("libsql://db.example.com?authToken=tok").unwrap(),
            CatalogLocation::Remote {
                url: "libsql://db.example.com".into(),
                auth_token: "tok".into(),
            }
        );
        assert!(CatalogLocation::parse("  ").is_err());
    }

    #[test]
    fn rejects_unsupported_schemes() {
        let err = CatalogLocation::parse("mongodb://ci:pw@db.example.com:27017/library").unwrap_err();
        assert!(matches!(err, BibliothekError::Config { .. }));
        assert!(err.to_string().contains("'mongodb'"));
        assert!(!err.to_string().contains("pw"));

        assert!(CatalogLocation::parse("mongodb://h/db").is_err());
        assert_eq!(
            CatalogLocation::parse(r"C:\ci\catalog.db").unwrap(),
            CatalogLocation::Local(PathBuf::from(r"C:\ci\catalog.db"))
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_creates_nothing() {
        let cwd_marker = std::path::Path::new("mongodb:");
        let existed = cwd_marker.exists();
        assert!(Catalog::connect("mongodb://ci:pw@db.example.com:27017/library").await.is_err());
        assert_eq!(cwd_marker.exists(), existed);
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let catalog = test_catalog().await;
        assert_eq!(catalog.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("bibliothek_test_{}.db", Uuid::now_v7()));
        let first = Catalog::open(&tmp).await.expect("first open");
        first.close().await.expect("close");
        let second = Catalog::open(&tmp).await.expect("second open");
        assert_eq!(second.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn project_upsert_is_idempotent() {
        let catalog = test_catalog().await;

        let first = catalog.upsert_project("foo", "Foo").await.unwrap();
        let second = catalog.upsert_project("foo", "Renamed Foo").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(count_rows(&catalog, "projects").await, 1);

        let project = catalog.get_project_by_name("foo").await.unwrap().unwrap();
        assert_eq!(project.friendly_name, "Foo");
    }

    #[tokio::test]
    async fn version_keeps_original_group() {
        let catalog = test_catalog().await;
        let project = catalog.upsert_project("foo", "Foo").await.unwrap();
        let group_a = catalog.upsert_version_group(project, "1.x").await.unwrap();
        let group_b = catalog.upsert_version_group(project, "legacy").await.unwrap();
        assert_ne!(group_a, group_b);

        let created = catalog.upsert_version(project, group_a, "1.0").await.unwrap();
        let again = catalog.upsert_version(project, group_b, "1.0").await.unwrap();

        assert_eq!(created.id, again.id);
        assert_eq!(again.version_group_id, group_a);
        assert_eq!(count_rows(&catalog, "versions").await, 1);
    }

    #[tokio::test]
    async fn version_names_are_scoped_per_project() {
        let catalog = test_catalog().await;
        let foo = catalog.upsert_project("foo", "Foo").await.unwrap();
        let bar = catalog.upsert_project("bar", "Bar").await.unwrap();
        let foo_group = catalog.upsert_version_group(foo, "1.x").await.unwrap();
        let bar_group = catalog.upsert_version_group(bar, "1.x").await.unwrap();
        assert_ne!(foo_group, bar_group);

        let foo_version = catalog.upsert_version(foo, foo_group, "1.0").await.unwrap();
        let bar_version = catalog.upsert_version(bar, bar_group, "1.0").await.unwrap();
        assert_ne!(foo_version.id, bar_version.id);
    }

    #[tokio::test]
    async fn duplicate_build_numbers_and_latest_by_insertion() {
        let catalog = test_catalog().await;
        let project = catalog.upsert_project("foo", "Foo").await.unwrap();
        let group = catalog.upsert_version_group(project, "1.x").await.unwrap();
        let version = catalog.upsert_version(project, group, "1.0").await.unwrap();

        assert!(catalog.latest_build(project, version.id).await.unwrap().is_none());

        let mut downloads = ArtifactManifest::new();
        downloads
            .insert(
                ArtifactType::new("application").unwrap(),
                ArtifactRef {
                    name: "foo-1.0-7.jar".into(),
                    sha256: "ab".repeat(32),
                },
            )
            .unwrap();

        let first_changes = vec![change("aaa")];
        let first = catalog
            .insert_build(&NewBuild {
                project_id: project,
                version_id: version.id,
                number: 7,
                channel: BuildChannel::Default,
                changes: &first_changes,
                downloads: &downloads,
            })
            .await
            .unwrap();

        let second_changes = vec![change("ccc"), change("bbb")];
        let second = catalog
            .insert_build(&NewBuild {
                project_id: project,
                version_id: version.id,
                number: 7,
                channel: BuildChannel::Experimental,
                changes: &second_changes,
                downloads: &downloads,
            })
            .await
            .unwrap();
        assert_ne!(first, second);

        let builds = catalog.list_builds(project, version.id).await.unwrap();
        assert_eq!(builds.len(), 2);
        assert!(builds.iter().all(|b| b.number == 7 && !b.promoted));

        let latest = catalog
            .latest_build(project, version.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.channel, BuildChannel::Experimental);
        assert_eq!(latest.changes[0].commit, "ccc");
        assert_eq!(latest.downloads, downloads);
    }

    #[tokio::test]
    async fn scoped_returns_body_error() {
        let tmp = std::env::temp_dir().join(format!("bibliothek_test_{}.db", Uuid::now_v7()));
        let connection = tmp.to_string_lossy().to_string();

        let result: Result<()> = Catalog::scoped(&connection, async |catalog| {
            catalog.upsert_project("foo", "Foo").await?;
            Err(BibliothekError::validation("boom"))
        })
        .await;
        assert!(result.unwrap_err().to_string().contains("boom"));

        // The write before the failure is durable and the file is reusable.
        let project = Catalog::scoped(&connection, async |catalog| {
            catalog.get_project_by_name("foo").await
        })
        .await
        .unwrap();
        assert!(project.is_some());
    }
}

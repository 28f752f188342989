//! SQL migration definitions for the build catalog.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: projects, version_groups, versions, builds",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS projects (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    friendly_name TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS version_groups (
    id         TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(project_id, name)
);

CREATE TABLE IF NOT EXISTS versions (
    id               TEXT PRIMARY KEY,
    project_id       TEXT NOT NULL REFERENCES projects(id),
    version_group_id TEXT NOT NULL REFERENCES version_groups(id),
    name             TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    UNIQUE(project_id, name)
);

-- Append-only. `seq` is the insertion order used to find the latest build.
CREATE TABLE IF NOT EXISTS builds (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    id             TEXT NOT NULL UNIQUE,
    project_id     TEXT NOT NULL REFERENCES projects(id),
    version_id     TEXT NOT NULL REFERENCES versions(id),
    number         INTEGER NOT NULL,
    time           TEXT NOT NULL,
    changes_json   TEXT NOT NULL,
    downloads_json TEXT NOT NULL,
    promoted       INTEGER NOT NULL DEFAULT 0,
    channel        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_builds_project_version ON builds(project_id, version_id, seq);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

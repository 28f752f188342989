//! Build-registration configuration.
//!
//! The config document lives next to the build (`ankh-bibliothek.json` by
//! default). Environment variables override document values, and the merged
//! result is validated once into an immutable [`InsertConfig`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BibliothekError, Result};
use crate::types::{ArtifactType, BuildChannel};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "ankh-bibliothek.json";

/// Blob store used when the document does not name one.
pub const DEFAULT_BLOB_STORE_URL: &str = "https://s0.blobs.inksnow.org";

// ---------------------------------------------------------------------------
// Config document (as written on disk)
// ---------------------------------------------------------------------------

/// Raw config document. Every field may be absent because the environment
/// can still supply it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDocument {
    /// Catalog connection string.
    #[serde(alias = "mongodbUrl")]
    pub catalog_url: Option<String>,
    /// Blob store base URL.
    pub blob_store_url: Option<String>,
    pub repo_username: Option<String>,
    pub repo_password: Option<String>,
    pub project_name: Option<String>,
    pub project_friendly_name: Option<String>,
    pub version_group_name: Option<String>,
    pub version_name: Option<String>,
    pub build_number: Option<u32>,
    pub build_channel: Option<BuildChannel>,
    pub repository_path: Option<PathBuf>,
    pub downloads: Vec<DownloadConfig>,
}

/// One `downloads[]` entry of the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Glob pattern locating the artifact file.
    pub path: String,
    /// Matching options for `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<MatchOptions>,
    /// Artifact type key in the build's downloads map.
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Suffix of the published filename.
    pub name: String,
}

/// Options controlling how an artifact pattern is matched on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Directory the pattern is relative to. Defaults to the process cwd.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Also match path components starting with `.`.
    pub dot: bool,
    /// Patterns (relative to `cwd`) whose matches are dropped.
    pub ignore: Vec<String>,
    /// Case-insensitive matching.
    pub nocase: bool,
    /// Follow symlinked directories while walking.
    pub follow: bool,
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// A validated artifact declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDeclaration {
    pub pattern: String,
    pub options: MatchOptions,
    pub artifact_type: ArtifactType,
    pub name: String,
}

/// Fully-populated, validated registration request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertConfig {
    pub catalog_url: String,
    pub blob_store_url: Url,
    pub repo_username: String,
    pub repo_password: String,
    pub project_name: String,
    pub project_friendly_name: String,
    pub version_group_name: String,
    pub version_name: String,
    pub build_number: u32,
    pub build_channel: BuildChannel,
    pub repository_path: PathBuf,
    pub downloads: Vec<ArtifactDeclaration>,
}

impl InsertConfig {
    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.repo_password = "********".into();
        copy.catalog_url = redact_connection_string(&self.catalog_url);
        copy
    }
}

fn redact_connection_string(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.query().is_some() || url.password().is_some() => {
            url.set_query(None);
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Loading and layering
// ---------------------------------------------------------------------------

/// Read and parse a config document. `.toml` files are parsed as TOML,
/// everything else as JSON.
pub fn load_document(path: &Path) -> Result<ConfigDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| BibliothekError::io(path, e))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&content).map_err(|e| {
            BibliothekError::config(format!("failed to parse {}: {e}", path.display()))
        })
    } else {
        serde_json::from_str(&content).map_err(|e| {
            BibliothekError::config(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

/// Load the document at `path`, layer the process environment on top and
/// validate the result.
pub fn load_config(path: &Path) -> Result<InsertConfig> {
    let document = load_document(path)?;
    tracing::debug!(?path, "loaded config document");
    resolve_config(document, |key| std::env::var(key).ok())
}

/// Layer environment overrides onto `document` and validate.
///
/// `env` looks up a variable by name; empty values count as unset.
pub fn resolve_config(
    document: ConfigDocument,
    env: impl Fn(&str) -> Option<String>,
) -> Result<InsertConfig> {
    let var = |key: &str| env(key).filter(|v| !v.is_empty());

    let catalog_url = var("CATALOG_URL")
        .or_else(|| var("MONGODB_URL"))
        .or(document.catalog_url);
    let blob_store_url = var("BLOB_STORE_URL").or(document.blob_store_url);
    let repo_username = var("REPO_USERNAME").or(document.repo_username);
    let repo_password = var("REPO_PASSWORD").or(document.repo_password);
    let project_name = var("PROJECT_NAME").or(document.project_name);
    let project_friendly_name = var("PROJECT_FRIENDLY_NAME").or(document.project_friendly_name);
    let version_group_name = var("VERSION_GROUP_NAME").or(document.version_group_name);
    let version_name = var("VERSION_NAME").or(document.version_name);
    let repository_path = var("REPOSITORY_PATH")
        .map(PathBuf::from)
        .or(document.repository_path);

    let build_number = match var("BUILD_NUMBER") {
        Some(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
            BibliothekError::config(format!("BUILD_NUMBER '{raw}' is not a valid build number: {e}"))
        })?),
        None => document.build_number,
    };
    let build_channel = match var("BUILD_CHANNEL") {
        Some(raw) => raw.trim().parse::<BuildChannel>()?,
        None => document.build_channel.unwrap_or_default(),
    };

    let project_name = required(project_name, "projectName")?;
    let blob_store_url = blob_store_url.unwrap_or_else(|| DEFAULT_BLOB_STORE_URL.to_string());
    let blob_store_url = Url::parse(&blob_store_url).map_err(|e| {
        BibliothekError::config(format!("blobStoreUrl '{blob_store_url}' is not a valid URL: {e}"))
    })?;

    let config = InsertConfig {
        catalog_url: required(catalog_url, "catalogUrl")?,
        blob_store_url,
        repo_username: required(repo_username, "repoUsername")?,
        repo_password: required(repo_password, "repoPassword")?,
        project_friendly_name: project_friendly_name.unwrap_or_else(|| project_name.clone()),
        project_name,
        version_group_name: required(version_group_name, "versionGroupName")?,
        version_name: required(version_name, "versionName")?,
        build_number: build_number
            .ok_or_else(|| BibliothekError::config("buildNumber is required"))?,
        build_channel,
        repository_path: repository_path.unwrap_or_else(|| PathBuf::from(".")),
        downloads: declarations(document.downloads)?,
    };

    Ok(config)
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BibliothekError::config(format!("{field} is required"))),
    }
}

/// Validate download entries: non-empty pattern and name, unique types.
fn declarations(downloads: Vec<DownloadConfig>) -> Result<Vec<ArtifactDeclaration>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(downloads.len());

    for (index, download) in downloads.into_iter().enumerate() {
        if download.path.trim().is_empty() {
            return Err(BibliothekError::config(format!(
                "downloads[{index}].path is required"
            )));
        }
        if download.name.trim().is_empty() {
            return Err(BibliothekError::config(format!(
                "downloads[{index}].name is required"
            )));
        }
        let artifact_type = ArtifactType::new(&download.artifact_type).map_err(|e| {
            BibliothekError::config(format!("downloads[{index}].type is invalid: {e}"))
        })?;
        if !seen.insert(artifact_type.clone()) {
            return Err(BibliothekError::config(format!(
                "downloads[{index}].type '{artifact_type}' is declared more than once"
            )));
        }

        out.push(ArtifactDeclaration {
            pattern: download.path,
            options: download.glob.unwrap_or_default(),
            artifact_type,
            name: download.name,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample_document() -> ConfigDocument {
        serde_json::from_str(
            r#"{
                "mongodbUrl": "file:/tmp/catalog.db",
                "repoUsername": "ci",
                "repoPassword": "secret",
                "projectName": "foo",
                "projectFriendlyName": "Foo",
                "versionGroupName": "1.x",
                "versionName": "1.0",
                "buildNumber": 5,
                "buildChannel": "EXPERIMENTAL",
                "repositoryPath": "/src/foo",
                "downloads": [
                    { "path": "build/libs/*.jar", "type": "application", "name": "jar" },
                    { "path": "dist/*.exe", "glob": { "nocase": true }, "type": "installer.win", "name": "installer-win" }
                ]
            }"#,
        )
        .expect("parse sample document")
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolves_document_without_env() {
        let config = resolve_config(sample_document(), no_env).expect("resolve");
        assert_eq!(config.catalog_url, "file:/tmp/catalog.db");
        assert_eq!(config.blob_store_url.as_str(), "https://s0.blobs.inksnow.org/");
        assert_eq!(config.build_number, 5);
        assert_eq!(config.build_channel, BuildChannel::Experimental);
        assert_eq!(config.downloads.len(), 2);
        assert_eq!(config.downloads[1].artifact_type.as_str(), "installer:win");
        assert!(config.downloads[1].options.nocase);
    }

    #[test]
    fn env_overrides_document() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VERSION_GROUP_NAME", "2.x"),
            ("VERSION_NAME", "2.0"),
            ("BUILD_NUMBER", "42"),
            ("BUILD_CHANNEL", "DEFAULT"),
            ("PROJECT_NAME", ""),
        ]);
        let config = resolve_config(sample_document(), |k| env.get(k).map(|v| v.to_string()))
            .expect("resolve");

        assert_eq!(config.version_group_name, "2.x");
        assert_eq!(config.version_name, "2.0");
        assert_eq!(config.build_number, 42);
        assert_eq!(config.build_channel, BuildChannel::Default);
        // Empty values do not override.
        assert_eq!(config.project_name, "foo");
    }

    #[test]
    fn invalid_build_number_is_config_error() {
        let result = resolve_config(sample_document(), |k| {
            (k == "BUILD_NUMBER").then(|| "five".to_string())
        });
        assert!(matches!(result, Err(BibliothekError::Config { .. })));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut document = sample_document();
        document.repo_password = None;
        let err = resolve_config(document, no_env).unwrap_err();
        assert!(err.to_string().contains("repoPassword is required"));
    }

    #[test]
    fn duplicate_artifact_types_rejected() {
        let mut document = sample_document();
        document.downloads[1].artifact_type = "application".into();
        let err = resolve_config(document, no_env).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn friendly_name_defaults_to_project_name() {
        let mut document = sample_document();
        document.project_friendly_name = None;
        let config = resolve_config(document, no_env).unwrap();
        assert_eq!(config.project_friendly_name, "foo");
    }

    #[test]
    fn toml_document_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bibliothek.toml");
        std::fs::write(
            &path,
            r#"
catalogUrl = "catalog.db"
projectName = "foo"
buildNumber = 1

[[downloads]]
path = "out/*.zip"
type = "archive"
name = "zip"
"#,
        )
        .unwrap();

        let document = load_document(&path).expect("load toml");
        assert_eq!(document.project_name.as_deref(), Some("foo"));
        assert_eq!(document.downloads[0].name, "zip");
    }

    #[test]
    fn redacted_hides_secrets() {
        let mut document = sample_document();
        document.catalog_url = Some("libsql://db.example.com?authToken=abc".into());
        let config = resolve_config(document, no_env).unwrap().redacted();
        assert_eq!(config.repo_password, "********");
        assert!(!config.catalog_url.contains("abc"));
    }
}

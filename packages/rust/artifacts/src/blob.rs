//! Blob store client for published artifacts.
//!
//! Artifacts are written with `PUT {base}/build/{project}/{version}/{build}/{file}`
//! using HTTP basic auth. Any non-2xx answer is a fatal upload error.

use std::future::Future;

use bibliothek_shared::{BibliothekError, Result};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for upload requests.
const USER_AGENT: &str = concat!("Bibliothek/", env!("CARGO_PKG_VERSION"));

/// Path of a blob below the store's build root, as individual segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPath(Vec<String>);

impl BlobPath {
    /// `{project}/{version}/{build}/{file}`.
    pub fn for_artifact(project: &str, version: &str, build_number: u32, file_name: &str) -> Self {
        Self(vec![
            project.to_string(),
            version.to_string(),
            build_number.to_string(),
            file_name.to_string(),
        ])
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Display for BlobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Destination for artifact bytes.
pub trait BlobStore {
    /// Store `body` at `path`, overwriting any previous content.
    fn put(&self, path: &BlobPath, body: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP blob store speaking the `PUT /build/...` protocol.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpBlobStore {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(BibliothekError::config(format!(
                "blob store URL '{base_url}' cannot be used as a base URL"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BibliothekError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Full URL of a blob. Segments are percent-encoded.
    pub fn url_for(&self, path: &BlobPath) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("build").extend(path.segments());
        }
        url
    }
}

impl BlobStore for HttpBlobStore {
    #[instrument(skip_all, fields(path = %path))]
    async fn put(&self, path: &BlobPath, body: Vec<u8>) -> Result<()> {
        let url = self.url_for(path);
        debug!(%url, bytes = body.len(), "uploading blob");

        let response = self
            .client
            .put(url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .basic_auth(&self.username, Some(&self.password))
            .body(body)
            .send()
            .await
            .map_err(|e| BibliothekError::Network(format!("PUT {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response.text().await);
            return Err(BibliothekError::Upload {
                target: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Response text for an upload error, or a placeholder naming why it
/// could not be read.
fn error_body(text: reqwest::Result<String>) -> String {
    text.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(base: &str) -> HttpBlobStore {
        HttpBlobStore::new(Url::parse(base).unwrap(), "user", "pass").unwrap()
    }

    #[test]
    fn url_layout() {
        let blob = BlobPath::for_artifact("foo", "1.0", 5, "foo-1.0-5.jar");
        assert_eq!(blob.to_string(), "foo/1.0/5/foo-1.0-5.jar");

        let url = store("https://blobs.example.com").url_for(&blob);
        assert_eq!(url.as_str(), "https://blobs.example.com/build/foo/1.0/5/foo-1.0-5.jar");

        let url = store("https://blobs.example.com/mirror/").url_for(&blob);
        assert_eq!(
            url.as_str(),
            "https://blobs.example.com/mirror/build/foo/1.0/5/foo-1.0-5.jar"
        );
    }

    #[test]
    fn segments_are_encoded() {
        let blob = BlobPath::for_artifact("foo", "1.0 beta", 5, "foo-1.0 beta-5.jar");
        let url = store("https://blobs.example.com").url_for(&blob);
        assert_eq!(
            url.path(),
            "/build/foo/1.0%20beta/5/foo-1.0%20beta-5.jar"
        );
    }

    #[tokio::test]
    async fn put_sends_bytes_with_auth() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/build/foo/1.0/5/foo-1.0-5.jar"))
            .and(header("content-type", "application/octet-stream"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(body_bytes(b"jar bytes".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let blob = BlobPath::for_artifact("foo", "1.0", 5, "foo-1.0-5.jar");
        store(&server.uri())
            .put(&blob, b"jar bytes".to_vec())
            .await
            .expect("upload succeeds");
    }

    #[tokio::test]
    async fn non_success_status_is_upload_error() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let blob = BlobPath::for_artifact("foo", "1.0", 5, "foo-1.0-5.jar");
        let err = store(&server.uri())
            .put(&blob, b"jar bytes".to_vec())
            .await
            .unwrap_err();

        match err {
            BibliothekError::Upload { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreadable_error_body_is_reported() {
        // Nothing listens on port 1, so the request itself fails.
        let failure = reqwest::get("http://127.0.0.1:1/").await.unwrap_err();
        let body = error_body(Err(failure));
        assert!(body.starts_with("<unreadable body: "), "{body}");
        assert_eq!(error_body(Ok("quota exceeded".into())), "quota exceeded");
    }
}

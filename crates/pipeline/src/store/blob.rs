//! Artifact storage keyed by `{scene_id}_{artifact}`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use geopulse_cloud::auth::{CloudAuth, NoAuth};
use geopulse_cloud::{HttpClient, PutOutcome};
use tracing::debug;

use crate::error::{PipelineError, Result};

const CONTENT_TYPE: &str = "image/tiff; application=geotiff";

/// Object name for a key; artifacts are GeoTIFFs.
fn object_name(key: &str) -> String {
    format!("{}.tif", key)
}

/// Blob storage for derived rasters.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Write `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Write `body` only if nothing is stored under `key` yet.
    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome>;

    /// Public reference for `key`.
    fn url_for(&self, key: &str) -> String;
}

/// Blobs as files in a local directory.
///
/// `put_if_absent` writes a temporary file and hard-links it into place, so a
/// visible object is always complete and an existing one is never replaced.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: Option<String>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base: None,
        }
    }

    /// Serve URLs from `base` (e.g. a static file host) instead of `file://`.
    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(object_name(key))
    }

    async fn write_temp(&self, key: &str, body: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PipelineError::blob(key, e))?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", object_name(key), uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| PipelineError::blob(key, e))?;
        Ok(tmp)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .map_err(|e| PipelineError::blob(key, e))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let tmp = self.write_temp(key, &body).await?;
        tokio::fs::rename(&tmp, self.path_for(key))
            .await
            .map_err(|e| PipelineError::blob(key, e))
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome> {
        let tmp = self.write_temp(key, &body).await?;
        let linked = tokio::fs::hard_link(&tmp, self.path_for(key)).await;
        let _ = tokio::fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => Ok(PutOutcome::Created),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(key, "blob already present");
                Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => Err(PipelineError::blob(key, e)),
        }
    }

    fn url_for(&self, key: &str) -> String {
        match &self.public_base {
            Some(base) => format!("{}/{}", base, object_name(key)),
            None => format!("file://{}", self.path_for(key).display()),
        }
    }
}

/// Blobs behind an HTTP object endpoint (S3-compatible PUT/HEAD).
pub struct HttpBlobStore {
    base_url: String,
    http: HttpClient,
    auth: Arc<dyn CloudAuth>,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth: Arc::new(NoAuth),
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn CloudAuth>) -> Self {
        self.auth = auth;
        self
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.http
            .exists(&self.url_for(key), self.auth.as_ref())
            .await
            .map_err(|e| PipelineError::blob(key, e))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.http
            .put(&self.url_for(key), body, CONTENT_TYPE, false, self.auth.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::blob(key, e))
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<PutOutcome> {
        self.http
            .put(&self.url_for(key), body, CONTENT_TYPE, true, self.auth.as_ref())
            .await
            .map_err(|e| PipelineError::blob(key, e))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, object_name(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_put_if_absent_keeps_first_write() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(!store.exists("S_ndmi").await.unwrap());
        assert_eq!(
            store.put_if_absent("S_ndmi", b"first".to_vec()).await.unwrap(),
            PutOutcome::Created
        );
        assert_eq!(
            store.put_if_absent("S_ndmi", b"second".to_vec()).await.unwrap(),
            PutOutcome::AlreadyExists
        );
        assert!(store.exists("S_ndmi").await.unwrap());
        assert_eq!(std::fs::read(dir.path().join("S_ndmi.tif")).unwrap(), b"first");

        // no temporaries left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn local_put_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.put("k", b"a".to_vec()).await.unwrap();
        store.put("k", b"b".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("k.tif")).unwrap(), b"b");
    }

    #[test]
    fn urls() {
        let local = LocalBlobStore::new("/data/blobs").with_public_base("https://cdn.example.com/geo/");
        assert_eq!(local.url_for("S_msavi2"), "https://cdn.example.com/geo/S_msavi2.tif");
        assert_eq!(
            LocalBlobStore::new("/data/blobs").url_for("S_ndmi"),
            "file:///data/blobs/S_ndmi.tif"
        );

        let http = HttpBlobStore::new(
            "https://bucket.s3.amazonaws.com/",
            HttpClient::new(std::time::Duration::from_secs(5)).unwrap(),
        );
        assert_eq!(http.url_for("S_ndmi"), "https://bucket.s3.amazonaws.com/S_ndmi.tif");
    }
}

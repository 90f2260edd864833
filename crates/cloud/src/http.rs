//! HTTP client wrapper for band downloads and blob storage.
//!
//! No request is retried here; callers decide whether a failed stage is
//! worth repeating.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// HTTP client shared by the band source and the HTTP blob store.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

/// What happened to a conditional upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The object was written.
    Created,
    /// An object already existed under the key and was left untouched.
    AlreadyExists,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    fn signed(
        &self,
        mut req: RequestBuilder,
        url: &str,
        method: &str,
        auth: &dyn CloudAuth,
    ) -> Result<RequestBuilder> {
        let mut auth_headers = Vec::new();
        auth.sign_request(url, method, &mut auth_headers)?;
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        Ok(req)
    }

    /// Stream `url` into the file at `dest`, returning the bytes written.
    ///
    /// `dest` is created or truncated. On error it may hold a partial body.
    pub async fn download_to(&self, url: &str, dest: &Path, auth: &dyn CloudAuth) -> Result<u64> {
        let req = self.signed(self.client.get(url), url, "GET", auth)?;
        let mut resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CloudError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, dest = %dest.display(), "download complete");
        Ok(written)
    }

    /// HEAD `url`: `true` on 2xx, `false` on 404/403, error otherwise.
    ///
    /// S3-style stores answer 403 for missing keys when listing is denied.
    pub async fn exists(&self, url: &str, auth: &dyn CloudAuth) -> Result<bool> {
        let req = self.signed(self.client.head(url), url, "HEAD", auth)?;
        let resp = req.send().await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            s => Err(CloudError::Status {
                status: s.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    /// PUT `body` to `url`.
    ///
    /// With `if_none_match` the request carries `If-None-Match: *`, and a
    /// 412 answer means another writer got there first.
    pub async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        if_none_match: bool,
        auth: &dyn CloudAuth,
    ) -> Result<PutOutcome> {
        let mut req = self
            .client
            .put(url)
            .header("Content-Type", content_type)
            .body(body);
        if if_none_match {
            req = req.header("If-None-Match", "*");
        }
        let req = self.signed(req, url, "PUT", auth)?;
        let resp = req.send().await?;

        match resp.status() {
            s if s.is_success() => Ok(PutOutcome::Created),
            StatusCode::PRECONDITION_FAILED if if_none_match => Ok(PutOutcome::AlreadyExists),
            s => Err(CloudError::Status {
                status: s.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

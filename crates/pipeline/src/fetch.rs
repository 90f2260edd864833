//! Concurrent band acquisition into scratch storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{FuturesOrdered, StreamExt};
use geopulse_cloud::auth::NoAuth;
use geopulse_cloud::{CloudError, HttpClient};
use tracing::{debug, info};

use crate::catalog::{Band, Scene};
use crate::error::{PipelineError, Result};

/// Somewhere band files can be copied from.
#[async_trait]
pub trait BandSource: Send + Sync {
    /// Write the object at `href` to `dest`, replacing any existing file.
    async fn fetch(&self, href: &str, dest: &Path) -> std::result::Result<(), CloudError>;
}

/// [`BandSource`] over HTTP(S), e.g. the public Sentinel-2 COG bucket.
pub struct HttpBandSource {
    http: HttpClient,
}

impl HttpBandSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl BandSource for HttpBandSource {
    async fn fetch(&self, href: &str, dest: &Path) -> std::result::Result<(), CloudError> {
        self.http.download_to(href, dest, &NoAuth).await?;
        Ok(())
    }
}

/// Local paths of one scene's bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSet {
    pub nir: PathBuf,
    pub swir: PathBuf,
    pub red: PathBuf,
}

/// Scratch file for a band: `{scratch}/{scene_id}_{band}.tif`.
pub fn band_path(scratch: &Path, scene_id: &str, band: Band) -> PathBuf {
    scratch.join(format!("{}_{}.tif", scene_id, band.name()))
}

/// Fetch every band of `scene` into `scratch`, concurrently.
///
/// A band whose scratch file already exists is reused. Bodies are written to
/// a `.part` sibling and renamed when complete. Any failure fails the whole
/// set.
pub async fn fetch_bands(source: &dyn BandSource, scene: &Scene, scratch: &Path) -> Result<BandSet> {
    tokio::fs::create_dir_all(scratch)
        .await
        .map_err(|e| PipelineError::DownloadError {
            band: "all",
            source: CloudError::Io(e),
        })?;

    let mut futs = FuturesOrdered::new();
    for band in Band::ALL {
        futs.push_back(fetch_one(source, scene, scratch, band));
    }

    // Keys are deterministic, so only completion matters here
    while let Some(res) = futs.next().await {
        res?;
    }

    Ok(BandSet {
        nir: band_path(scratch, &scene.id, Band::Nir),
        swir: band_path(scratch, &scene.id, Band::Swir),
        red: band_path(scratch, &scene.id, Band::Red),
    })
}

async fn fetch_one(
    source: &dyn BandSource,
    scene: &Scene,
    scratch: &Path,
    band: Band,
) -> Result<PathBuf> {
    let dest = band_path(scratch, &scene.id, band);
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        debug!(scene_id = %scene.id, band = band.name(), "band already in scratch");
        return Ok(dest);
    }

    let part = part_path(&dest);
    let href = scene.href(band);
    info!(scene_id = %scene.id, band = band.name(), href, "downloading band");

    let download_err = |source| PipelineError::DownloadError {
        band: band.name(),
        source,
    };
    if let Err(e) = source.fetch(href, &part).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(download_err(e));
    }

    // A concurrent run for the same scene may have finished first; its file
    // holds the same bytes.
    if let Err(e) = tokio::fs::rename(&part, &dest).await {
        let _ = tokio::fs::remove_file(&part).await;
        if !tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Err(download_err(CloudError::Io(e)));
        }
        debug!(scene_id = %scene.id, band = band.name(), "band written by another run");
    }

    Ok(dest)
}

/// Per-download temporary sibling of `dest`, so concurrent downloads of one
/// band never share a file.
fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, uuid::Uuid::new_v4()))
}

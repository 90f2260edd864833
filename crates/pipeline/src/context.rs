//! Collaborators handed to every pipeline stage.

use std::sync::Arc;

use geopulse_cloud::HttpClient;

use crate::cache::CacheGuard;
use crate::catalog::{SceneCatalog, StacSceneCatalog};
use crate::classify::{KmeansClassifier, LandCoverClassifier, LAND_COVER_CLASSES};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fetch::{BandSource, HttpBandSource};
use crate::status::StatusTracker;
use crate::store::{BlobStore, RecordStore};

/// Configuration plus one implementation of each seam.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub catalog: Arc<dyn SceneCatalog>,
    pub bands: Arc<dyn BandSource>,
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
    pub classifier: Arc<dyn LandCoverClassifier>,
}

impl PipelineContext {
    /// Context with a [`LAND_COVER_CLASSES`]-way k-means classifier seeded
    /// from `config`.
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<dyn SceneCatalog>,
        bands: Arc<dyn BandSource>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let classifier = Arc::new(KmeansClassifier::new(LAND_COVER_CLASSES, config.seed));
        Self {
            config,
            catalog,
            bands,
            blobs,
            records,
            classifier,
        }
    }

    /// STAC catalog and HTTP band source from `config`; storage supplied.
    pub fn from_config(
        config: PipelineConfig,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let catalog = Arc::new(StacSceneCatalog::from_config(&config)?);
        let http = HttpClient::new(config.request_timeout).map_err(|e| PipelineError::DownloadError {
            band: "all",
            source: e,
        })?;
        let bands = Arc::new(HttpBandSource::new(http));
        Ok(Self::new(config, catalog, bands, blobs, records))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn LandCoverClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn cache_guard(&self) -> CacheGuard {
        CacheGuard::new(self.blobs.clone())
    }

    pub fn status_tracker(&self) -> StatusTracker {
        StatusTracker::new(self.records.clone())
    }
}

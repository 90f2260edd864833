//! Cache guard: skip work whose artifacts are already stored.
//!
//! The guard checks each key separately. It is not a test-and-set: two runs
//! for the same scene can both miss and both recompute. Uploads use
//! `put_if_absent`, so the first complete object under a key wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::store::BlobStore;

/// Blob key for one artifact of a scene.
pub fn artifact_key(scene_id: &str, artifact: &str) -> String {
    format!("{}_{}", scene_id, artifact)
}

/// References to a scene's stored artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    pub ndmi: String,
    pub msavi2: String,
    pub labels: Option<String>,
}

#[derive(Clone)]
pub struct CacheGuard {
    blobs: Arc<dyn BlobStore>,
}

impl CacheGuard {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// The stored artifacts for `scene_id` when both index rasters exist.
    pub async fn check(&self, scene_id: &str) -> Result<Option<Artifacts>> {
        let ndmi = artifact_key(scene_id, "ndmi");
        let msavi2 = artifact_key(scene_id, "msavi2");

        if !self.blobs.exists(&ndmi).await? || !self.blobs.exists(&msavi2).await? {
            debug!(scene_id, "cache miss");
            return Ok(None);
        }

        let labels = artifact_key(scene_id, "labels");
        let labels = if self.blobs.exists(&labels).await? {
            Some(self.blobs.url_for(&labels))
        } else {
            None
        };

        debug!(scene_id, "cache hit");
        Ok(Some(Artifacts {
            ndmi: self.blobs.url_for(&ndmi),
            msavi2: self.blobs.url_for(&msavi2),
            labels,
        }))
    }
}

//! Classification stage and the clustering seam.

use std::path::{Path, PathBuf};

use geopulse_algorithms::classification::{classify_indices, KmeansParams};
use geopulse_core::io::write_geotiff_u8;
use geopulse_core::Raster;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Turns a (moisture, vegetation) raster pair into class labels.
pub trait LandCoverClassifier: Send + Sync {
    fn classify(&self, moisture: &Raster<f32>, vegetation: &Raster<f32>) -> Result<Raster<u8>>;
}

/// Number of land-cover classes produced for a scene.
pub const LAND_COVER_CLASSES: usize = 6;

/// Seeded k-means classifier.
#[derive(Debug, Clone)]
pub struct KmeansClassifier {
    params: KmeansParams,
}

impl KmeansClassifier {
    pub fn new(clusters: usize, seed: u64) -> Self {
        Self {
            params: KmeansParams {
                k: clusters,
                seed,
                ..Default::default()
            },
        }
    }
}

impl LandCoverClassifier for KmeansClassifier {
    fn classify(&self, moisture: &Raster<f32>, vegetation: &Raster<f32>) -> Result<Raster<u8>> {
        classify_indices(moisture, vegetation, &self.params).map_err(PipelineError::Classification)
    }
}

/// Scratch file for the label raster.
pub fn labels_path(scratch: &Path, scene_id: &str) -> PathBuf {
    scratch.join(format!("{}_labels.tif", scene_id))
}

/// Classify and write the labels as a single-band byte GeoTIFF.
pub fn classify_scene(
    classifier: &dyn LandCoverClassifier,
    moisture: &Raster<f32>,
    vegetation: &Raster<f32>,
    scratch: &Path,
    scene_id: &str,
) -> Result<PathBuf> {
    let labels = classifier.classify(moisture, vegetation)?;

    let mut classes: Vec<u8> = labels.data().iter().copied().collect();
    classes.sort_unstable();
    classes.dedup();
    info!(scene_id, ?classes, "clustering completed");

    let path = labels_path(scratch, scene_id);
    write_geotiff_u8(&labels, &path).map_err(|e| PipelineError::raster_io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopulse_algorithms::classification::NODATA_LABEL;
    use geopulse_core::io::read_geotiff;
    use geopulse_core::GeoTransform;
    use tempfile::TempDir;

    fn raster(values: Vec<f32>) -> Raster<f32> {
        let n = values.len();
        let mut r = Raster::from_vec(values, 1, n).unwrap();
        r.set_transform(GeoTransform::new(0.0, 1.0, 10.0, -10.0));
        r
    }

    #[test]
    fn writes_label_raster() {
        let dir = TempDir::new().unwrap();
        let moisture = raster((0..24).map(|i| (i % 7) as f32 / 7.0).collect());
        let vegetation = raster((0..24).map(|i| (i % 5) as f32 / 5.0).collect());

        let classifier = KmeansClassifier::new(6, 42);
        let path = classify_scene(&classifier, &moisture, &vegetation, dir.path(), "S").unwrap();

        assert_eq!(path, dir.path().join("S_labels.tif"));
        let labels: Raster<u8> = read_geotiff(&path).unwrap();
        assert_eq!(labels.shape(), (1, 24));
        assert!(labels.data().iter().all(|&l| l < 6));
        assert_eq!(labels.nodata(), Some(NODATA_LABEL));
    }

    #[test]
    fn degenerate_input_is_classification_error() {
        let dir = TempDir::new().unwrap();
        let flat = raster(vec![0.5; 12]);
        let err = classify_scene(&KmeansClassifier::new(6, 42), &flat, &flat, dir.path(), "S")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Classification(_)));
        assert_eq!(err.status_code(), 500);
    }
}

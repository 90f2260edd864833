//! Index stage: NDMI and MSAVI2 rasters from scratch bands.

use std::path::{Path, PathBuf};

use geopulse_algorithms::imagery::SpectralIndex;
use geopulse_core::io::{read_geotiff, write_geotiff};
use geopulse_core::Raster;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Output of the index stage.
#[derive(Debug, Clone)]
pub struct IndexRasters {
    pub ndmi: Raster<f32>,
    pub msavi2: Raster<f32>,
    pub ndmi_path: PathBuf,
    pub msavi2_path: PathBuf,
}

/// Scratch file for an index: `{scratch}/{scene_id}_{suffix}.tif`.
pub fn index_path(scratch: &Path, scene_id: &str, index: SpectralIndex) -> PathBuf {
    scratch.join(format!("{}_{}.tif", scene_id, index.suffix()))
}

fn read_band(path: &Path) -> Result<Raster<f32>> {
    read_geotiff(path).map_err(|e| PipelineError::raster_io(path, e))
}

/// Compute both indices from the NIR, (resampled) SWIR and red bands and
/// write them to scratch storage.
pub fn compute_indices(
    nir: &Path,
    swir: &Path,
    red: &Path,
    scratch: &Path,
    scene_id: &str,
) -> Result<IndexRasters> {
    let nir_band = read_band(nir)?;
    let swir_band = read_band(swir)?;
    let red_band = read_band(red)?;

    let compute = |index: SpectralIndex, other: &Raster<f32>, other_path: &Path| -> Result<(Raster<f32>, PathBuf)> {
        let raster = index
            .compute(&nir_band, other)
            .map_err(|e| PipelineError::raster_io(other_path, e))?;
        let path = index_path(scratch, scene_id, index);
        write_geotiff(&raster, &path).map_err(|e| PipelineError::raster_io(&path, e))?;

        let stats = raster.statistics();
        info!(
            scene_id,
            index = index.name(),
            min = ?stats.min,
            max = ?stats.max,
            non_finite = stats.non_finite_count,
            "index computed"
        );
        Ok((raster, path))
    };

    let (msavi2, msavi2_path) = compute(SpectralIndex::Msavi2, &red_band, red)?;
    let (ndmi, ndmi_path) = compute(SpectralIndex::Ndmi, &swir_band, swir)?;

    Ok(IndexRasters {
        ndmi,
        msavi2,
        ndmi_path,
        msavi2_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geopulse_core::{GeoTransform, CRS};
    use tempfile::TempDir;

    fn write_band(dir: &Path, name: &str, values: Vec<f32>) -> PathBuf {
        let mut r = Raster::from_vec(values, 1, 2).unwrap();
        r.set_transform(GeoTransform::new(600_000.0, 4_100_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::utm(36, true)));
        let path = dir.join(name);
        write_geotiff(&r, &path).unwrap();
        path
    }

    #[test]
    fn writes_both_indices() {
        let dir = TempDir::new().unwrap();
        let nir = write_band(dir.path(), "nir.tif", vec![100.0, 50.0]);
        let swir = write_band(dir.path(), "swir.tif", vec![50.0, 50.0]);
        let red = write_band(dir.path(), "red.tif", vec![20.0, 50.0]);

        let out = compute_indices(&nir, &swir, &red, dir.path(), "SCENE").unwrap();

        assert_eq!(out.ndmi_path, dir.path().join("SCENE_ndmi.tif"));
        assert_eq!(out.msavi2_path, dir.path().join("SCENE_msavi2.tif"));
        assert_relative_eq!(out.ndmi.get(0, 0).unwrap(), 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(out.ndmi.get(0, 1).unwrap(), 0.0);

        let on_disk: Raster<f32> = read_geotiff(&out.ndmi_path).unwrap();
        assert_eq!(on_disk.data(), out.ndmi.data());
        assert_eq!(on_disk.crs(), Some(&CRS::utm(36, true)));
    }

    #[test]
    fn mismatched_grid_is_processing_error() {
        let dir = TempDir::new().unwrap();
        let nir = write_band(dir.path(), "nir.tif", vec![1.0, 2.0]);
        let red = write_band(dir.path(), "red.tif", vec![1.0, 2.0]);
        let swir = dir.path().join("swir.tif");
        write_geotiff(&Raster::from_vec(vec![1.0f32; 4], 2, 2).unwrap(), &swir).unwrap();

        let err = compute_indices(&nir, &swir, &red, dir.path(), "SCENE").unwrap_err();
        assert!(matches!(err, PipelineError::RasterIO { .. }));
        assert_eq!(err.status_code(), 500);
    }
}

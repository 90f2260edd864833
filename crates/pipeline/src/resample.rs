//! SWIR resampling onto the 10 m grid.

use std::path::{Path, PathBuf};

use geopulse_core::io::{read_geotiff, write_geotiff};
use geopulse_core::{resample_nearest, Raster};
use tracing::info;

use crate::error::{PipelineError, Result};

/// `{dir}/{stem}_resampled.tif` for `{dir}/{stem}.tif`
pub fn resampled_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_resampled.tif", stem))
}

/// Nearest-neighbour resample the band at `input` to `x_res` × `y_res`,
/// write it next to the input and delete the input.
pub fn resample_band(input: &Path, x_res: f64, y_res: f64) -> Result<PathBuf> {
    let err = |source| PipelineError::Resample {
        path: input.display().to_string(),
        source,
    };

    let band: Raster<f32> = read_geotiff(input).map_err(err)?;
    let resampled = resample_nearest(&band, x_res, y_res).map_err(err)?;

    let output = resampled_path(input);
    write_geotiff(&resampled, &output).map_err(err)?;
    std::fs::remove_file(input).map_err(|e| err(e.into()))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        from = ?band.shape(),
        to = ?resampled.shape(),
        "band resampled"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopulse_core::{GeoTransform, CRS};
    use tempfile::TempDir;

    #[test]
    fn resamples_and_removes_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("S2B_T36SVF_swir.tif");

        let mut swir = Raster::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], 2, 2).unwrap();
        swir.set_transform(GeoTransform::new(600_000.0, 4_100_040.0, 20.0, -20.0));
        swir.set_crs(Some(CRS::utm(36, true)));
        write_geotiff(&swir, &input).unwrap();

        let output = resample_band(&input, 10.0, 10.0).unwrap();
        assert_eq!(output, dir.path().join("S2B_T36SVF_swir_resampled.tif"));
        assert!(!input.exists());

        let out: Raster<f32> = read_geotiff(&output).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.transform().pixel_width, 10.0);
        assert_eq!(out.crs(), Some(&CRS::utm(36, true)));
        assert_eq!(out.get(3, 3).unwrap(), 4.0);
    }

    #[test]
    fn missing_input_is_resample_error() {
        let dir = TempDir::new().unwrap();
        let err = resample_band(&dir.path().join("nope.tif"), 10.0, 10.0).unwrap_err();
        assert!(matches!(err, PipelineError::Resample { .. }));
        assert_eq!(err.status_code(), 500);
    }
}

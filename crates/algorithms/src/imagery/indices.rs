//! Moisture and vegetation indices
//!
//! Both indices are evaluated per pixel in `f32`. Nothing is masked or
//! clamped: a zero denominator or negative radicand yields the IEEE result
//! (±inf or NaN) in that cell. Outputs carry the NIR band's geotransform
//! and projection.

use crate::maybe_rayon::*;
use geopulse_core::raster::Raster;
use geopulse_core::{Error, Result};
use ndarray::Array2;

/// Indices produced by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralIndex {
    /// Normalized Difference Moisture Index, from NIR and SWIR
    Ndmi,
    /// Modified Soil Adjusted Vegetation Index 2, from NIR and red
    Msavi2,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 2] = [SpectralIndex::Ndmi, SpectralIndex::Msavi2];

    /// Display name, e.g. `NDMI`
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Msavi2 => "MSAVI2",
        }
    }

    /// Lowercase suffix used in file names and blob keys
    pub fn suffix(&self) -> &'static str {
        match self {
            SpectralIndex::Ndmi => "ndmi",
            SpectralIndex::Msavi2 => "msavi2",
        }
    }

    /// Evaluate the index. `other` is SWIR for NDMI and red for MSAVI2.
    pub fn compute(&self, nir: &Raster<f32>, other: &Raster<f32>) -> Result<Raster<f32>> {
        match self {
            SpectralIndex::Ndmi => ndmi(nir, other),
            SpectralIndex::Msavi2 => msavi2(nir, other),
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized Difference Moisture Index
///
/// `NDMI = (NIR - SWIR) / (NIR + SWIR)`
///
/// Higher values indicate more canopy water. `swir` must already be on the
/// NIR grid (20 m SWIR is resampled to 10 m first).
pub fn ndmi(nir: &Raster<f32>, swir: &Raster<f32>) -> Result<Raster<f32>> {
    per_pixel(nir, swir, |n, s| (n - s) / (n + s))
}

/// Modified Soil Adjusted Vegetation Index (Qi et al., 1994)
///
/// `MSAVI2 = (2·NIR + 1 - sqrt((2·NIR + 1)² - 8·(NIR - RED))) / 2`
pub fn msavi2(nir: &Raster<f32>, red: &Raster<f32>) -> Result<Raster<f32>> {
    per_pixel(nir, red, |n, r| {
        let a = 2.0 * n + 1.0;
        (a - (a * a - 8.0 * (n - r)).sqrt()) / 2.0
    })
}

fn per_pixel<F>(nir: &Raster<f32>, other: &Raster<f32>, f: F) -> Result<Raster<f32>>
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    nir.check_same_grid(other)?;

    let (rows, cols) = nir.shape();
    let a = nir.data();
    let b = other.data();

    let data: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| f(a[(row, col)], b[(row, col)]))
                .collect::<Vec<f32>>()
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    nir.with_same_meta(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geopulse_core::{GeoTransform, CRS};

    fn band(values: Vec<f32>, rows: usize, cols: usize) -> Raster<f32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(600_000.0, 4_100_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::utm(36, true)));
        r
    }

    #[test]
    fn ndmi_known_values() {
        let nir = band(vec![100.0, 50.0], 1, 2);
        let swir = band(vec![50.0, 50.0], 1, 2);

        let out = ndmi(&nir, &swir).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.0 / 3.0, epsilon = 1e-6);
        assert_eq!(out.get(0, 1).unwrap(), 0.0);
    }

    #[test]
    fn ndmi_equal_bands_is_zero_except_zero_over_zero() {
        let nir = band(vec![7.0, 0.0, 1200.0, 3.5], 2, 2);
        let swir = nir.clone();

        let out = ndmi(&nir, &swir).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert!(out.get(0, 1).unwrap().is_nan());
        assert_eq!(out.get(1, 0).unwrap(), 0.0);
        assert_eq!(out.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn ndmi_division_by_zero_propagates() {
        let nir = band(vec![1.0], 1, 1);
        let swir = band(vec![-1.0], 1, 1);
        let out = ndmi(&nir, &swir).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), f32::INFINITY);
    }

    #[test]
    fn msavi2_known_values() {
        // NIR 0.5, red 0.1: a = 2, sqrt(4 - 3.2) = 0.894427
        let nir = band(vec![0.5, 0.0], 1, 2);
        let red = band(vec![0.1, 0.0], 1, 2);

        let out = msavi2(&nir, &red).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), (2.0 - 0.8f32.sqrt()) / 2.0, epsilon = 1e-6);
        assert_eq!(out.get(0, 1).unwrap(), 0.0);
    }

    #[test]
    fn msavi2_negative_radicand_is_nan() {
        // a = 3, a² = 9, 8·(1 - (-1)) = 16
        let nir = band(vec![1.0], 1, 1);
        let red = band(vec![-1.0], 1, 1);
        assert!(msavi2(&nir, &red).unwrap().get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn output_takes_nir_metadata() {
        let nir = band(vec![0.3; 6], 2, 3);
        let red = band(vec![0.1; 6], 2, 3);
        let out = SpectralIndex::Msavi2.compute(&nir, &red).unwrap();

        assert_eq!(out.shape(), (2, 3));
        assert_eq!(out.transform(), nir.transform());
        assert_eq!(out.crs(), nir.crs());
    }

    #[test]
    fn mismatched_grids_rejected() {
        let nir = band(vec![0.3; 6], 2, 3);
        let swir = band(vec![0.1; 4], 2, 2);
        assert!(matches!(ndmi(&nir, &swir), Err(Error::SizeMismatch { .. })));

        let mut shifted = band(vec![0.1; 6], 2, 3);
        shifted.set_transform(GeoTransform::new(600_010.0, 4_100_000.0, 10.0, -10.0));
        assert!(matches!(ndmi(&nir, &shifted), Err(Error::TransformMismatch(..))));
    }

    #[test]
    fn names_and_suffixes() {
        assert_eq!(SpectralIndex::Ndmi.suffix(), "ndmi");
        assert_eq!(SpectralIndex::Msavi2.to_string(), "MSAVI2");
    }
}

//! Land-cover classes from a moisture/vegetation index pair

use super::kmeans::{kmeans, KmeansParams};
use geopulse_core::raster::Raster;
use geopulse_core::{Error, Result};
use ndarray::Array2;

/// Label written where either index is NaN or infinite.
pub const NODATA_LABEL: u8 = 255;

/// Cluster each pixel's (moisture, vegetation) pair into `params.k` classes.
///
/// Returns a `u8` raster on the inputs' grid with labels `0..k`; pixels with a
/// non-finite index value are left out of the fit and get [`NODATA_LABEL`].
pub fn classify_indices(
    moisture: &Raster<f32>,
    vegetation: &Raster<f32>,
    params: &KmeansParams,
) -> Result<Raster<u8>> {
    moisture.check_same_grid(vegetation)?;
    if params.k >= NODATA_LABEL as usize {
        return Err(Error::InvalidParameter {
            name: "k",
            value: params.k.to_string(),
            reason: format!("labels must stay below the nodata label {}", NODATA_LABEL),
        });
    }

    let (rows, cols) = moisture.shape();
    let pairs: Vec<(usize, f32, f32)> = moisture
        .data()
        .iter()
        .zip(vegetation.data().iter())
        .enumerate()
        .filter(|(_, (m, v))| m.is_finite() && v.is_finite())
        .map(|(idx, (&m, &v))| (idx, m, v))
        .collect();

    let features = Array2::from_shape_fn((pairs.len(), 2), |(i, j)| {
        if j == 0 {
            pairs[i].1
        } else {
            pairs[i].2
        }
    });
    let fit = kmeans(features.view(), params)?;

    let mut labels = vec![NODATA_LABEL; rows * cols];
    for (&(idx, _, _), &label) in pairs.iter().zip(fit.labels.iter()) {
        labels[idx] = label as u8;
    }

    let array = Array2::from_shape_vec((rows, cols), labels).map_err(|e| Error::Other(e.to_string()))?;
    let mut output = moisture.with_same_meta(array)?;
    output.set_nodata(Some(NODATA_LABEL));
    Ok(output)
}

//! Nearest-neighbour resampling to a target pixel size
//!
//! Produces a raster covering the same extent as the source at a new
//! resolution, keeping origin and projection. Used to bring 20 m SWIR
//! bands onto the 10 m NIR/red grid.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};

/// Resample `src` to `x_res` × `y_res` (in CRS units) by nearest neighbour.
///
/// Output dimensions are the source extent divided by the new resolution,
/// rounded to the nearest whole pixel. Output cells whose center falls
/// outside the source take the source nodata value (or the type default).
pub fn resample_nearest<T: RasterElement>(
    src: &Raster<T>,
    x_res: f64,
    y_res: f64,
) -> Result<Raster<T>> {
    for (name, value) in [("x_res", x_res), ("y_res", y_res)] {
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::InvalidParameter {
                name,
                value: value.to_string(),
                reason: "resolution must be a positive number".into(),
            });
        }
    }
    if src.is_empty() {
        return Err(Error::InvalidDimensions {
            width: src.cols(),
            height: src.rows(),
        });
    }

    let src_gt = src.transform();
    let extent_x = src.cols() as f64 * src_gt.pixel_width.abs();
    let extent_y = src.rows() as f64 * src_gt.pixel_height.abs();
    let out_cols = ((extent_x / x_res).round() as usize).max(1);
    let out_rows = ((extent_y / y_res).round() as usize).max(1);

    let out_gt = src_gt.with_resolution(x_res, y_res);
    let fill = src.nodata().unwrap_or_else(T::default_nodata);
    let (src_rows, src_cols) = src.shape();

    let data = Array2::from_shape_fn((out_rows, out_cols), |(row, col)| {
        let (x, y) = out_gt.pixel_to_geo(col, row);
        let (sc, sr) = src_gt.geo_to_pixel(x, y);
        if sc < 0.0 || sr < 0.0 {
            return fill;
        }
        let (sc, sr) = (sc.floor() as usize, sr.floor() as usize);
        if sr < src_rows && sc < src_cols {
            src.data()[(sr, sc)]
        } else {
            fill
        }
    });

    let mut out = Raster::from_array(data);
    out.set_transform(out_gt);
    out.set_crs(src.crs().cloned());
    out.set_nodata(src.nodata());
    Ok(out)
}

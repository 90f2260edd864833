//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// Tolerance used when comparing geotransforms of rasters that are
/// combined cell by cell.
const GRID_TOLERANCE: f64 = 1e-6;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// the geotransform and projection needed to write it back out.
///
/// # Example
///
/// ```ignore
/// use geopulse_core::Raster;
///
/// let mut raster: Raster<f32> = Raster::new(100, 100);
/// raster.set(10, 20, 0.42)?;
/// let value = raster.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Wrap `data` in a raster carrying this raster's geotransform and projection.
    ///
    /// `data` must have the same shape as `self`.
    pub fn with_same_meta<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        })
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Verify that `other` lies on the same grid: shape, geotransform and,
    /// when both declare one, projection.
    pub fn check_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = other.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        if !self.transform.approx_eq(other.transform(), GRID_TOLERANCE) {
            return Err(Error::TransformMismatch(
                self.transform.to_gdal(),
                other.transform().to_gdal(),
            ));
        }
        if let (Some(a), Some(b)) = (self.crs(), other.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
            }
        }
        Ok(())
    }

    /// Min, max and mean over finite cells. Non-finite cells (NaN, ±inf)
    /// are counted separately instead of poisoning the summary.
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;

        for v in self.data.iter().filter_map(|v| v.to_f64()) {
            if !v.is_finite() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }

        let (min, max, mean) = if count > 0 {
            (Some(min), Some(max), Some(sum / count as f64))
        } else {
            (None, None, None)
        };

        RasterStatistics {
            min,
            max,
            mean,
            finite_count: count,
            non_finite_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub finite_count: usize,
    pub non_finite_count: usize,
}

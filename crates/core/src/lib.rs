//! # GeoPulse Core
//!
//! Raster primitives shared by every GeoPulse crate.
//!
//! This crate provides:
//! - `Raster<T>`: a georeferenced 2D grid
//! - `GeoTransform`: affine pixel → geographic mapping
//! - `CRS`: the raster projection, carried by EPSG code or WKT
//! - GeoTIFF reading/writing through the `tiff` crate
//! - Nearest-neighbour resampling to a target resolution

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{resample_nearest, GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}

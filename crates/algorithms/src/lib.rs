//! # GeoPulse Algorithms
//!
//! Raster kernels used by the processing pipeline.
//!
//! - **imagery**: NDMI moisture and MSAVI2 vegetation indices
//! - **classification**: seeded k-means over paired index values
//!
//! Enable the `parallel` feature to spread row work across rayon's pool.

pub mod classification;
pub mod imagery;
mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{classify_indices, kmeans, KmeansFit, KmeansParams, NODATA_LABEL};
    pub use crate::imagery::{msavi2, ndmi, SpectralIndex};
    pub use geopulse_core::prelude::*;
}

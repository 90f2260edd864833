//! Unsupervised land-cover classification
//!
//! - **K-means**: seeded k-means++ over an n×d feature matrix
//! - **Land cover**: clusters paired (moisture, vegetation) index rasters

mod kmeans;
mod land_cover;

pub use kmeans::{kmeans, KmeansFit, KmeansParams};
pub use land_cover::{classify_indices, NODATA_LABEL};

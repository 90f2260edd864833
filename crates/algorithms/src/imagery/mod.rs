//! Spectral indices computed from Sentinel-2 bands
//!
//! - NDMI: normalized difference moisture index (NIR, SWIR)
//! - MSAVI2: modified soil adjusted vegetation index (NIR, red)

mod indices;

pub use indices::{msavi2, ndmi, SpectralIndex};

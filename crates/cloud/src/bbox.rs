//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounding box in (lon, lat) degrees: `(min_x, min_y, max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Square box of half-width `radius` around a point.
    pub fn around(lon: f64, lat: f64, radius: f64) -> Self {
        Self::new(lon - radius, lat - radius, lon + radius, lat + radius)
    }

    /// All four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }

    /// Whether `other` lies entirely inside this box (edges included).
    pub fn contains(&self, other: &BBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// `[west, south, east, north]`, the order STAC expects.
    pub fn as_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

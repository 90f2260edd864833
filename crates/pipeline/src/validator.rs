//! Coordinate validation.

use geopulse_cloud::BBox;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A point of interest in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Build the search box `(lon-r, lat-r, lon+r, lat+r)` and check that it is
/// non-empty and lies inside `region`. Pure; no side effects.
pub fn validate(point: Coordinates, radius: f64, region: &BBox) -> Result<BBox> {
    let bbox = BBox::around(point.lon, point.lat, radius);

    // A radius too small to move the coordinates gives an empty box
    let ordered = bbox.min_x < bbox.max_x && bbox.min_y < bbox.max_y;
    if !(radius.is_finite() && radius > 0.0)
        || !bbox.is_finite()
        || !ordered
        || !region.contains(&bbox)
    {
        return Err(PipelineError::InvalidCoordinates {
            lat: point.lat,
            lon: point.lon,
            radius,
        });
    }
    Ok(bbox)
}

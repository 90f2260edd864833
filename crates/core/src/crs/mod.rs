//! Raster projection handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Projection attached to a raster.
///
/// GeoTIFFs written by GeoPulse carry the projection as an EPSG code in the
/// GeoKey directory, so that is the primary representation. WKT is kept for
/// rasters whose projection arrived as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// UTM zone CRS on WGS84 (EPSG:326xx north, 327xx south).
    ///
    /// Sentinel-2 L2A tiles are delivered in these.
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether the CRS is geographic (lat/lon degrees) rather than projected.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326) | Some(4258) | Some(4269))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => match (&self.wkt, &other.wkt) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_codes() {
        assert_eq!(CRS::utm(36, true).epsg(), Some(32636));
        assert_eq!(CRS::utm(21, false).epsg(), Some(32721));
        assert_eq!(CRS::utm(36, true).identifier(), "EPSG:32636");
    }

    #[test]
    fn equivalence_needs_matching_representation() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(32636).is_equivalent(&CRS::from_epsg(32635)));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_wkt("GEOGCS[...]")));
    }

    #[test]
    fn geographic_flag() {
        assert!(CRS::wgs84().is_geographic());
        assert!(!CRS::utm(36, true).is_geographic());
    }
}

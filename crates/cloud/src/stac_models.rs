//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Serde models for one page of STAC Item Search (POST /search): the request
//! body, the returned items, their cloud cover and their band assets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bbox::BBox;

/// Body for `POST /search` (STAC API – Item Search).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StacSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounding box `[west, south, east, north]`.
    pub fn bbox(mut self, bbox: &BBox) -> Self {
        self.bbox = Some(bbox.as_array().to_vec());
        self
    }

    /// Set datetime or datetime range (e.g. `"2024-01-01T00:00:00Z/2024-03-05T00:00:00Z"`).
    pub fn datetime(mut self, dt: &str) -> Self {
        self.datetime = Some(dt.to_string());
        self
    }

    pub fn collections(mut self, cols: &[&str]) -> Self {
        self.collections = Some(cols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Set maximum items per page.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

/// A STAC Item Collection (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<StacItem>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,
}

impl StacItemCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    /// Unique item identifier.
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl StacItem {
    /// Get an asset by key.
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// `eo:cloud_cover` in percent, if the catalog reported one.
    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.eo_cloud_cover
    }

    /// EPSG code from the `proj:epsg` property, if available.
    pub fn epsg(&self) -> Option<u32> {
        self.properties
            .extra
            .get("proj:epsg")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
    }
}

/// STAC Item properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// All other properties we don't model explicitly.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single STAC Asset (file reference).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    /// URL to the asset file.
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "id": "S2B_36SVF_20240214_0_L2A",
      "bbox": [30.6, 36.1, 31.8, 37.1],
      "properties": {
        "datetime": "2024-02-14T08:52:11Z",
        "eo:cloud_cover": 3.41,
        "platform": "sentinel-2b",
        "proj:epsg": 32636
      },
      "assets": {
        "red": { "href": "https://example.com/B04.tif", "title": "Red (band 4) - 10m" },
        "nir": { "href": "https://example.com/B08.tif", "title": "NIR 1 (band 8) - 10m" },
        "swir22": { "href": "https://example.com/B12.tif", "title": "SWIR 2.2μm (band 12) - 20m" }
      },
      "collection": "sentinel-2-l2a"
    },
    {
      "type": "Feature",
      "id": "S2A_36SVF_20240212_0_L2A",
      "properties": { "datetime": "2024-02-12T08:52:11Z" },
      "assets": {}
    }
  ],
  "numberMatched": 2
}"#;

    #[test]
    fn parse_search_response() {
        let page: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.number_matched, Some(2));

        let item = &page.features[0];
        assert_eq!(item.cloud_cover(), Some(3.41));
        assert_eq!(item.epsg(), Some(32636));
        assert_eq!(item.asset("swir22").unwrap().href, "https://example.com/B12.tif");

        let bare = &page.features[1];
        assert_eq!(bare.cloud_cover(), None);
        assert!(bare.asset("nir").is_none());
    }

    #[test]
    fn search_params_body() {
        let params = StacSearchParams::new()
            .bbox(&BBox::new(31.0, 37.0, 31.1, 37.1))
            .datetime("2024-01-01T00:00:00.000Z/2024-03-05T00:00:00.000Z")
            .collections(&["sentinel-2-l2a"])
            .limit(12);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["bbox"], serde_json::json!([31.0, 37.0, 31.1, 37.1]));
        assert_eq!(json["collections"][0], "sentinel-2-l2a");
        assert_eq!(json["limit"], 12);

        let empty = serde_json::to_string(&StacSearchParams::new()).unwrap();
        assert_eq!(empty, "{}");
    }
}

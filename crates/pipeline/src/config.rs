//! Pipeline configuration.
//!
//! [`PipelineConfig::default`] matches the production deployment; every
//! field can be overridden from `GEOPULSE_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use geopulse_cloud::BBox;
use thiserror::Error;

/// Earth Search STAC API root.
pub const EARTH_SEARCH_URL: &str = "https://earth-search.aws.element84.com/v1";

/// Requests without a date use this STAC datetime interval.
pub const DEFAULT_DATE_RANGE: &str = "2024-01-01T00:00:00.000Z/2024-03-05T00:00:00.000Z";

/// Rectangle bounding Türkiye, in lon/lat degrees.
pub const TURKIYE: BBox = BBox {
    min_x: 25.66,
    min_y: 35.81,
    max_x: 44.83,
    max_y: 42.11,
};

/// Error reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// STAC API root (the client appends `/search`)
    pub catalog_url: String,
    /// STAC collection to search
    pub collection: String,
    /// Items requested from the catalog
    pub search_limit: u32,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Date range used when a request carries none
    pub default_date_range: String,
    /// Half-width of the search box around a point, in degrees
    pub radius: f64,
    /// Search boxes must lie inside this region
    pub allow_region: BBox,
    /// Where band files and intermediate rasters are written
    pub scratch_dir: PathBuf,
    /// SWIR is resampled to this pixel size (CRS units)
    pub target_resolution: f64,
    /// Seed for clustering initialization
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog_url: EARTH_SEARCH_URL.to_string(),
            collection: "sentinel-2-l2a".to_string(),
            search_limit: 12,
            request_timeout: Duration::from_secs(60),
            default_date_range: DEFAULT_DATE_RANGE.to_string(),
            radius: 1e-8,
            allow_region: TURKIYE,
            scratch_dir: std::env::temp_dir().join("geopulse"),
            target_resolution: 10.0,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with any `GEOPULSE_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GEOPULSE_CATALOG_URL") {
            self.catalog_url = v;
        }
        if let Some(v) = lookup("GEOPULSE_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = lookup("GEOPULSE_SEARCH_LIMIT") {
            self.search_limit = parse("GEOPULSE_SEARCH_LIMIT", &v)?;
        }
        if let Some(v) = lookup("GEOPULSE_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(parse("GEOPULSE_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("GEOPULSE_DATE_RANGE") {
            self.default_date_range = v;
        }
        if let Some(v) = lookup("GEOPULSE_RADIUS") {
            self.radius = parse("GEOPULSE_RADIUS", &v)?;
        }
        if let Some(v) = lookup("GEOPULSE_ALLOW_REGION") {
            self.allow_region = parse_bbox("GEOPULSE_ALLOW_REGION", &v)?;
        }
        if let Some(v) = lookup("GEOPULSE_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("GEOPULSE_RESOLUTION") {
            self.target_resolution = parse("GEOPULSE_RESOLUTION", &v)?;
        }
        if let Some(v) = lookup("GEOPULSE_SEED") {
            self.seed = parse("GEOPULSE_SEED", &v)?;
        }
        Ok(self)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// `min_x,min_y,max_x,max_y`
pub fn parse_bbox(key: &'static str, value: &str) -> Result<BBox, ConfigError> {
    let parts = value
        .split(',')
        .map(|p| parse::<f64>(key, p))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        &[min_x, min_y, max_x, max_y] if min_x < max_x && min_y < max_y => {
            Ok(BBox::new(min_x, min_y, max_x, max_y))
        }
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected min_x,min_y,max_x,max_y with min < max".into(),
        }),
    }
}

//! Scene catalog seam and Sentinel-2 scene selection.

use std::cmp::Ordering;

use async_trait::async_trait;
use geopulse_cloud::{BBox, StacCatalog, StacClient, StacClientOptions, StacItem, StacSearchParams};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// The three Sentinel-2 bands the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Nir,
    Swir,
    Red,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Nir, Band::Swir, Band::Red];

    /// Short name used in scratch keys (`{scene_id}_{name}`)
    pub fn name(&self) -> &'static str {
        match self {
            Band::Nir => "nir",
            Band::Swir => "swir",
            Band::Red => "red",
        }
    }

    /// Asset key in Earth Search's Sentinel-2 L2A items
    pub fn asset_key(&self) -> &'static str {
        match self {
            Band::Nir => "nir",
            Band::Swir => "swir22",
            Band::Red => "red",
        }
    }
}

/// A selected acquisition with its band references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub nir: String,
    pub swir: String,
    pub red: String,
    pub cloud_cover: Option<f64>,
}

impl Scene {
    pub fn href(&self, band: Band) -> &str {
        match band {
            Band::Nir => &self.nir,
            Band::Swir => &self.swir,
            Band::Red => &self.red,
        }
    }

    fn from_item(item: &StacItem) -> Option<Self> {
        let href = |band: Band| item.asset(band.asset_key()).map(|a| a.href.clone());
        Some(Self {
            id: item.id.clone(),
            nir: href(Band::Nir)?,
            swir: href(Band::Swir)?,
            red: href(Band::Red)?,
            cloud_cover: item.cloud_cover(),
        })
    }
}

/// Source of candidate scenes for a time window and area.
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    /// The best scene for `date_range` over `bbox`, or `None` when nothing
    /// usable was listed.
    async fn query(&self, date_range: &str, bbox: &BBox) -> Result<Option<Scene>>;
}

/// Pick the least cloudy usable item.
///
/// Ties keep catalog order. Items without a cloud-cover value rank after all
/// items that have one; items missing a band asset are skipped.
pub fn select_scene(items: &[StacItem]) -> Option<Scene> {
    let mut candidates: Vec<Scene> = items.iter().filter_map(Scene::from_item).collect();

    // sort_by is stable, so equal keys keep listing order
    candidates.sort_by(|a, b| match (a.cloud_cover, b.cloud_cover) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    candidates.into_iter().next()
}

/// [`SceneCatalog`] backed by a STAC Item Search endpoint.
pub struct StacSceneCatalog {
    client: StacClient,
    collection: String,
    limit: u32,
}

impl StacSceneCatalog {
    pub fn new(client: StacClient, collection: impl Into<String>, limit: u32) -> Self {
        Self {
            client,
            collection: collection.into(),
            limit,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = StacClient::new(
            StacCatalog::from_str_or_url(&config.catalog_url),
            StacClientOptions {
                request_timeout: config.request_timeout,
            },
        )
        .map_err(PipelineError::CatalogUnavailable)?;
        Ok(Self::new(client, config.collection.clone(), config.search_limit))
    }
}

#[async_trait]
impl SceneCatalog for StacSceneCatalog {
    async fn query(&self, date_range: &str, bbox: &BBox) -> Result<Option<Scene>> {
        let params = StacSearchParams::new()
            .bbox(bbox)
            .datetime(date_range)
            .collections(&[self.collection.as_str()])
            .limit(self.limit);

        let page = self
            .client
            .search(&params)
            .await
            .map_err(PipelineError::CatalogUnavailable)?;
        debug!(items = page.len(), "catalog answered");

        let scene = select_scene(&page.features);
        match &scene {
            Some(s) => info!(scene_id = %s.id, cloud_cover = ?s.cloud_cover, "selected scene"),
            None => info!(date_range, %bbox, "no usable scene listed"),
        }
        Ok(scene)
    }
}

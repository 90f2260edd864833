//! # GeoPulse Cloud
//!
//! Remote access for the processing pipeline:
//!
//! - STAC Item Search against Earth Search or any STAC API endpoint
//! - an HTTP client for downloading band files and probing/storing blobs
//! - pluggable request signing ([`auth::CloudAuth`])
//! - a geographic bounding box shared by search and validation

pub mod auth;
pub mod bbox;
pub mod error;
pub mod http;
pub mod stac_client;
pub mod stac_models;

pub use bbox::BBox;
pub use error::{CloudError, Result};
pub use http::{HttpClient, PutOutcome};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacAsset, StacItem, StacItemCollection, StacSearchParams};

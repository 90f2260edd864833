//! GeoPulse processing pipeline
//!
//! Turns a stored point of interest into moisture (NDMI) and vegetation
//! (MSAVI2) rasters plus a land-cover classification for the least cloudy
//! Sentinel-2 scene covering it.
//!
//! Stages, in order:
//! - [`validator`]: point → search box inside the allow-region
//! - [`catalog`]: STAC search and deterministic scene selection
//! - [`cache`]: skip scenes whose artifacts are already stored
//! - [`fetch`]: concurrent NIR/SWIR/red downloads
//! - [`resample`]: SWIR onto the 10 m grid
//! - [`indices`]: NDMI and MSAVI2
//! - [`classify`]: k-means over the two indices
//! - [`status`]: record state transitions
//!
//! [`pipeline::process_location`] runs them; [`handler::handle_process`] wraps
//! it in a status-coded response.

pub mod cache;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod indices;
pub mod locations;
pub mod pipeline;
pub mod resample;
pub mod status;
pub mod store;
pub mod validator;

pub use cache::{Artifacts, CacheGuard};
pub use catalog::{Band, Scene, SceneCatalog, StacSceneCatalog};
pub use classify::{KmeansClassifier, LandCoverClassifier};
pub use config::{ConfigError, PipelineConfig};
pub use context::PipelineContext;
pub use error::{ErrorKind, PipelineError, Result};
pub use fetch::{BandSource, HttpBandSource};
pub use handler::{handle_process, ProcessRequest, ProcessResponse};
pub use locations::{handle_locations, LocationInput, LocationRequest, LocationResponse};
pub use pipeline::{process_location, ProcessOutcome};
pub use status::{ProcessingStatus, StatusTracker};
pub use store::{
    BlobStore, HttpBlobStore, InMemoryRecordStore, JsonFileRecordStore, LocalBlobStore,
    LocationRecord, RecordStore,
};
pub use validator::Coordinates;

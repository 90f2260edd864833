//! End-to-end runs of the processing pipeline against in-process fakes.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use geopulse_cloud::{BBox, CloudError};
use geopulse_core::io::{read_geotiff, write_geotiff};
use geopulse_core::{GeoTransform, Raster, CRS};
use geopulse_pipeline::classify::{KmeansClassifier, LandCoverClassifier, LAND_COVER_CLASSES};
use geopulse_pipeline::locations::update_location;
use geopulse_pipeline::{
    handle_process, process_location, BandSource, Coordinates, InMemoryRecordStore,
    LocalBlobStore, LocationInput, LocationRecord, PipelineConfig, PipelineContext, PipelineError,
    ProcessOutcome, ProcessRequest, ProcessingStatus, RecordStore, Scene, SceneCatalog,
};
use tempfile::TempDir;

const SCENE_ID: &str = "S2A_36SVF_20240210_0_L2A";

struct CountingCatalog {
    scene: Option<Scene>,
    calls: AtomicUsize,
}

#[async_trait]
impl SceneCatalog for CountingCatalog {
    async fn query(
        &self,
        _date_range: &str,
        _bbox: &BBox,
    ) -> geopulse_pipeline::Result<Option<Scene>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scene.clone())
    }
}

/// Writes small synthetic bands: NIR and red on an 8x8 10 m grid, SWIR on
/// the matching 4x4 20 m grid.
struct SyntheticBands {
    calls: AtomicUsize,
    fail: bool,
}

impl SyntheticBands {
    fn band(href: &str) -> Raster<f32> {
        let (size, res) = if href.ends_with("B12.tif") { (4, 20.0) } else { (8, 10.0) };
        let values = (0..size * size)
            .map(|i| {
                let (r, c) = ((i / size) as f32, (i % size) as f32);
                match href {
                    h if h.ends_with("B08.tif") => 0.30 + 0.02 * r + 0.01 * c,
                    h if h.ends_with("B04.tif") => 0.05 + 0.015 * c + 0.003 * r,
                    _ => 0.10 + 0.04 * r - 0.01 * c,
                }
            })
            .collect();
        let mut raster = Raster::from_vec(values, size, size).unwrap();
        raster.set_transform(GeoTransform::new(600_000.0, 4_100_080.0, res, -res));
        raster.set_crs(Some(CRS::utm(36, true)));
        raster
    }
}

#[async_trait]
impl BandSource for SyntheticBands {
    async fn fetch(&self, href: &str, dest: &Path) -> Result<(), CloudError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CloudError::Status {
                status: 503,
                url: href.to_string(),
            });
        }
        write_geotiff(&Self::band(href), dest).map_err(|e| CloudError::InvalidResponse(e.to_string()))
    }
}

struct CountingClassifier {
    inner: KmeansClassifier,
    calls: AtomicUsize,
}

impl LandCoverClassifier for CountingClassifier {
    fn classify(
        &self,
        moisture: &Raster<f32>,
        vegetation: &Raster<f32>,
    ) -> geopulse_pipeline::Result<Raster<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.classify(moisture, vegetation)
    }
}

fn scene() -> Scene {
    Scene {
        id: SCENE_ID.to_string(),
        nir: "https://bands/B08.tif".to_string(),
        swir: "https://bands/B12.tif".to_string(),
        red: "https://bands/B04.tif".to_string(),
        cloud_cover: Some(2.5),
    }
}

struct Harness {
    _dir: TempDir,
    blob_root: std::path::PathBuf,
    ctx: PipelineContext,
    catalog: Arc<CountingCatalog>,
    bands: Arc<SyntheticBands>,
    classifier: Arc<CountingClassifier>,
    records: Arc<InMemoryRecordStore>,
}

impl Harness {
    fn new(scene: Option<Scene>, fail_downloads: bool, records: Vec<LocationRecord>) -> Self {
        let dir = TempDir::new().unwrap();
        let blob_root = dir.path().join("blobs");
        let config = PipelineConfig {
            scratch_dir: dir.path().join("scratch"),
            ..PipelineConfig::default()
        };

        let catalog = Arc::new(CountingCatalog {
            scene,
            calls: AtomicUsize::new(0),
        });
        let bands = Arc::new(SyntheticBands {
            calls: AtomicUsize::new(0),
            fail: fail_downloads,
        });
        let classifier = Arc::new(CountingClassifier {
            inner: KmeansClassifier::new(LAND_COVER_CLASSES, config.seed),
            calls: AtomicUsize::new(0),
        });
        let records = Arc::new(InMemoryRecordStore::with_records(records));
        let blobs = Arc::new(LocalBlobStore::new(&blob_root).with_public_base("https://blobs.test"));

        let ctx = PipelineContext::new(config, catalog.clone(), bands.clone(), blobs, records.clone())
            .with_classifier(classifier.clone());

        Self {
            _dir: dir,
            blob_root,
            ctx,
            catalog,
            bands,
            classifier,
            records,
        }
    }

    async fn status(&self, id: &str) -> ProcessingStatus {
        self.records.get(id).await.unwrap().unwrap().status
    }

    fn stored(&self, suffix: &str) -> usize {
        std::fs::read_dir(&self.blob_root)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn antalya(id: &str) -> LocationRecord {
    LocationRecord::new(id, "Antalya", Coordinates::new(37.0463, 31.1018), "olive groves")
}

#[tokio::test]
async fn created_record_becomes_processed() {
    let h = Harness::new(Some(scene()), false, vec![antalya("loc-1")]);

    let outcome = process_location(&h.ctx, "loc-1", None).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Processed { .. }));

    let artifacts = outcome.artifacts();
    assert!(artifacts.ndmi.ends_with(&format!("{}_ndmi.tif", SCENE_ID)));
    assert!(artifacts.msavi2.ends_with(&format!("{}_msavi2.tif", SCENE_ID)));
    assert!(artifacts.labels.as_deref().unwrap().ends_with("_labels.tif"));

    let record = h.records.get("loc-1").await.unwrap().unwrap();
    assert_eq!(record.status, ProcessingStatus::Processed);
    assert_eq!(record.ndmi.as_deref(), Some(artifacts.ndmi.as_str()));
    assert_eq!(record.scene_id.as_deref(), Some(SCENE_ID));

    // uploaded rasters share the 10 m band grid
    let ndmi: Raster<f32> = read_geotiff(h.blob_root.join(format!("{}_ndmi.tif", SCENE_ID))).unwrap();
    assert_eq!(ndmi.shape(), (8, 8));
    assert_eq!(ndmi.crs().and_then(|c| c.epsg()), Some(32636));
    let labels: Raster<u8> =
        read_geotiff(h.blob_root.join(format!("{}_labels.tif", SCENE_ID))).unwrap();
    assert_eq!(labels.shape(), ndmi.shape());
    assert!(labels.data().iter().all(|&l| (l as usize) < LAND_COVER_CLASSES));

    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.bands.calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_run_is_served_from_storage() {
    let h = Harness::new(Some(scene()), false, vec![antalya("loc-1")]);

    let first = process_location(&h.ctx, "loc-1", None).await.unwrap();
    let second = process_location(&h.ctx, "loc-1", None).await.unwrap();

    assert!(matches!(second, ProcessOutcome::AlreadyProcessed { .. }));
    assert_eq!(second.artifacts(), first.artifacts());
    assert_eq!(second.message(), "Image already processed");

    // nothing beyond the first run's calls
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.bands.calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);

    assert_eq!(h.stored("_ndmi.tif"), 1);
    assert_eq!(h.stored("_msavi2.tif"), 1);
    assert_eq!(h.stored(".tmp"), 0);
}

#[tokio::test]
async fn moved_location_is_searched_again() {
    let h = Harness::new(Some(scene()), false, vec![antalya("loc-1")]);
    process_location(&h.ctx, "loc-1", None).await.unwrap();
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);

    let ankara = LocationInput {
        name: Some("Ankara".to_string()),
        coordinates: Some(Coordinates::new(39.93, 32.85)),
        description: String::new(),
    };
    update_location(h.records.as_ref(), "loc-1", ankara).await.unwrap();

    process_location(&h.ctx, "loc-1", None).await.unwrap();
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 2);

    let record = h.records.get("loc-1").await.unwrap().unwrap();
    assert_eq!(record.status, ProcessingStatus::Processed);
    assert_eq!(record.coordinates, Coordinates::new(39.93, 32.85));
    assert_eq!(record.scene_id.as_deref(), Some(SCENE_ID));
}

#[tokio::test]
async fn other_location_adopts_stored_scene() {
    let h = Harness::new(
        Some(scene()),
        false,
        vec![antalya("loc-1"), antalya("loc-2")],
    );

    let first = process_location(&h.ctx, "loc-1", None).await.unwrap();
    let second = process_location(&h.ctx, "loc-2", None).await.unwrap();

    assert!(matches!(second, ProcessOutcome::AlreadyProcessed { .. }));
    assert_eq!(second.artifacts(), first.artifacts());
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.bands.calls.load(Ordering::SeqCst), 3);

    let adopted = h.records.get("loc-2").await.unwrap().unwrap();
    assert_eq!(adopted.status, ProcessingStatus::Processed);
    assert_eq!(adopted.msavi2.as_deref(), Some(first.artifacts().msavi2.as_str()));
}

#[tokio::test]
async fn out_of_region_point_is_rejected_untouched() {
    let berlin = LocationRecord::new("loc-b", "Berlin", Coordinates::new(52.52, 13.405), "");
    let h = Harness::new(Some(scene()), false, vec![berlin]);

    let err = process_location(&h.ctx, "loc-b", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCoordinates { .. }));
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.status("loc-b").await, ProcessingStatus::Created);
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn download_failure_marks_record_failed() {
    let h = Harness::new(Some(scene()), true, vec![antalya("loc-1")]);

    let err = process_location(&h.ctx, "loc-1", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::DownloadError { .. }));
    assert_eq!(err.status_code(), 502);
    assert_eq!(h.status("loc-1").await, ProcessingStatus::Failed);
    assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.stored(".tif"), 0);
}

#[tokio::test]
async fn missing_scene_is_not_found() {
    let h = Harness::new(None, false, vec![antalya("loc-1")]);

    let err = process_location(&h.ctx, "loc-1", Some("2019-01-01/2019-01-02"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoSuitableImage { .. }));
    assert_eq!(err.status_code(), 404);
    assert_eq!(h.status("loc-1").await, ProcessingStatus::Created);
}

#[tokio::test]
async fn handler_maps_outcomes_to_status_codes() {
    let h = Harness::new(Some(scene()), false, vec![antalya("loc-1")]);

    let missing = handle_process(&h.ctx, ProcessRequest::post("ghost")).await;
    assert_eq!(missing.status_code, 404);

    let mut get = ProcessRequest::post("loc-1");
    get.method = "GET".to_string();
    let resp = handle_process(&h.ctx, get).await;
    assert_eq!(resp.status_code, 405);
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 0);

    let ok = handle_process(&h.ctx, ProcessRequest::post("loc-1")).await;
    assert_eq!(ok.status_code, 200);
    assert_eq!(ok.message, "Image processed successfully");
    assert!(ok.ndmi.is_some() && ok.msavi2.is_some());

    let json = serde_json::to_value(&ok).unwrap();
    assert_eq!(json["statusCode"], 200);
}

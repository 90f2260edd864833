//! Orchestration of one processing request.
//!
//! validate → catalog → cache guard → fetch → resample → indices → classify
//! → upload → status. Each stage finishes completely before the next starts.

use std::path::PathBuf;

use futures::future::try_join_all;
use geopulse_cloud::PutOutcome;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::cache::{artifact_key, Artifacts};
use crate::catalog::Scene;
use crate::classify::classify_scene;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::fetch::fetch_bands;
use crate::indices::compute_indices;
use crate::resample::resample_band;
use crate::status::ProcessingStatus;
use crate::store::{BlobStore, LocationRecord};
use crate::validator::validate;

/// Successful result of [`process_location`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Artifacts were computed and uploaded by this run.
    Processed { scene_id: String, artifacts: Artifacts },
    /// Artifacts for the scene were already stored.
    AlreadyProcessed { scene_id: String, artifacts: Artifacts },
}

impl ProcessOutcome {
    pub fn artifacts(&self) -> &Artifacts {
        match self {
            ProcessOutcome::Processed { artifacts, .. }
            | ProcessOutcome::AlreadyProcessed { artifacts, .. } => artifacts,
        }
    }

    pub fn scene_id(&self) -> &str {
        match self {
            ProcessOutcome::Processed { scene_id, .. }
            | ProcessOutcome::AlreadyProcessed { scene_id, .. } => scene_id,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ProcessOutcome::Processed { .. } => "Image processed successfully",
            ProcessOutcome::AlreadyProcessed { .. } => "Image already processed",
        }
    }
}

/// Run the pipeline for the stored location `location_id`.
///
/// `date_range` is a STAC datetime interval; the configured default is used
/// when it is `None`.
#[instrument(skip(ctx))]
pub async fn process_location(
    ctx: &PipelineContext,
    location_id: &str,
    date_range: Option<&str>,
) -> Result<ProcessOutcome> {
    let date_range = date_range.unwrap_or(&ctx.config.default_date_range).to_string();

    let mut record = ctx
        .records
        .get(location_id)
        .await?
        .ok_or_else(|| PipelineError::LocationNotFound(location_id.to_string()))?;
    let bbox = validate(record.coordinates, ctx.config.radius, &ctx.config.allow_region)?;
    let guard = ctx.cache_guard();

    // A processed record remembers its scene, so a repeat request for the
    // same window needs no catalog round trip.
    if let Some(scene_id) = processed_scene(&record, &date_range) {
        if let Some(artifacts) = guard.check(scene_id).await? {
            info!(scene_id, "record already processed for this date range");
            return Ok(ProcessOutcome::AlreadyProcessed {
                scene_id: scene_id.to_string(),
                artifacts,
            });
        }
    }

    let scene = ctx
        .catalog
        .query(&date_range, &bbox)
        .await?
        .ok_or_else(|| PipelineError::NoSuitableImage {
            date_range: date_range.clone(),
        })?;

    let tracker = ctx.status_tracker();

    if let Some(artifacts) = guard.check(&scene.id).await? {
        info!(scene_id = %scene.id, "scene artifacts already stored");
        // Another location may have produced them; point this record at them too
        if processed_scene(&record, &date_range) != Some(scene.id.as_str()) {
            tracker.mark_processing(&mut record).await?;
            if let Err(e) = tracker
                .mark_processed(&mut record, &artifacts, &scene.id, &date_range)
                .await
            {
                tracker.mark_failed(&mut record).await;
                return Err(e);
            }
        }
        return Ok(ProcessOutcome::AlreadyProcessed {
            scene_id: scene.id,
            artifacts,
        });
    }

    tracker.mark_processing(&mut record).await?;

    let result = match run_stages(ctx, &scene).await {
        Ok(artifacts) => tracker
            .mark_processed(&mut record, &artifacts, &scene.id, &date_range)
            .await
            .map(|()| artifacts),
        Err(e) => Err(e),
    };

    match result {
        Ok(artifacts) => {
            info!(scene_id = %scene.id, ndmi = %artifacts.ndmi, msavi2 = %artifacts.msavi2, "processing complete");
            Ok(ProcessOutcome::Processed {
                scene_id: scene.id,
                artifacts,
            })
        }
        Err(e) => {
            error!(scene_id = %scene.id, error = %e, "processing failed");
            tracker.mark_failed(&mut record).await;
            Err(e)
        }
    }
}

fn processed_scene<'a>(record: &'a LocationRecord, date_range: &str) -> Option<&'a str> {
    if record.status == ProcessingStatus::Processed && record.date_range.as_deref() == Some(date_range) {
        record.scene_id.as_deref()
    } else {
        None
    }
}

async fn run_stages(ctx: &PipelineContext, scene: &Scene) -> Result<Artifacts> {
    let scratch = &ctx.config.scratch_dir;
    let resolution = ctx.config.target_resolution;

    let bands = fetch_bands(ctx.bands.as_ref(), scene, scratch).await?;
    let swir = resample_band(&bands.swir, resolution, resolution)?;
    let indices = compute_indices(&bands.nir, &swir, &bands.red, scratch, &scene.id)?;
    let labels = classify_scene(
        ctx.classifier.as_ref(),
        &indices.ndmi,
        &indices.msavi2,
        scratch,
        &scene.id,
    )?;

    let uploads = [
        ("ndmi", indices.ndmi_path),
        ("msavi2", indices.msavi2_path),
        ("labels", labels),
    ];
    let mut urls = try_join_all(
        uploads
            .into_iter()
            .map(|(artifact, path)| upload(ctx.blobs.as_ref(), &scene.id, artifact, path)),
    )
    .await?
    .into_iter();

    match (urls.next(), urls.next(), urls.next()) {
        (Some(ndmi), Some(msavi2), labels) => Ok(Artifacts { ndmi, msavi2, labels }),
        _ => Err(PipelineError::blob(&scene.id, "upload returned no reference")),
    }
}

async fn upload(blobs: &dyn BlobStore, scene_id: &str, artifact: &str, path: PathBuf) -> Result<String> {
    let key = artifact_key(scene_id, artifact);
    let body = tokio::fs::read(&path)
        .await
        .map_err(|e| PipelineError::raster_io(&path, e.into()))?;

    match blobs.put_if_absent(&key, body).await? {
        PutOutcome::Created => info!(%key, "artifact uploaded"),
        PutOutcome::AlreadyExists => info!(%key, "artifact already stored by another run"),
    }
    Ok(blobs.url_for(&key))
}

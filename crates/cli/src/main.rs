//! GeoPulse CLI - Sentinel-2 moisture, vegetation and land-cover processing

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geopulse_algorithms::classification::{classify_indices, KmeansParams};
use geopulse_algorithms::imagery::SpectralIndex;
use geopulse_cloud::auth::{BearerToken, CloudAuth};
use geopulse_cloud::HttpClient;
use geopulse_core::io::{read_geotiff, write_geotiff, write_geotiff_u8};
use geopulse_core::{resample_nearest, Raster};
use geopulse_pipeline::classify::LAND_COVER_CLASSES;
use geopulse_pipeline::locations::{
    create_location, delete_location, get_location, list_locations, update_location,
};
use geopulse_pipeline::validator::validate;
use geopulse_pipeline::{
    handle_process, BlobStore, Coordinates, HttpBlobStore, JsonFileRecordStore, LocalBlobStore,
    LocationInput, LocationRecord, PipelineConfig, PipelineContext, ProcessRequest, SceneCatalog,
    StacSceneCatalog,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geopulse")]
#[command(author, version, about = "Sentinel-2 moisture and land-cover processing", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file holding location records
    #[arg(long, global = true, env = "GEOPULSE_RECORDS", default_value = "geopulse-locations.json")]
    records: PathBuf,

    /// Directory for stored artifacts
    #[arg(long, global = true, env = "GEOPULSE_BLOB_ROOT", default_value = "geopulse-artifacts")]
    blob_root: PathBuf,

    /// Store artifacts over HTTP under this base URL instead of a local directory
    #[arg(long, global = true, env = "GEOPULSE_BLOB_URL")]
    blob_url: Option<String>,

    /// STAC API root
    #[arg(long, global = true, env = "GEOPULSE_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Scratch directory for bands and intermediate rasters
    #[arg(long, global = true, env = "GEOPULSE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Clustering seed
    #[arg(long, global = true, env = "GEOPULSE_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a stored location
    Process {
        /// Location id
        location_id: String,
        /// STAC datetime interval, e.g. 2024-01-01T00:00:00Z/2024-03-05T00:00:00Z
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Manage location records
    Locations {
        #[command(subcommand)]
        action: LocationCommands,
    },
    /// Show the scene that would be selected for a point
    Search {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Compute NDMI, MSAVI2 and land-cover classes from local band files
    Indices {
        /// NIR band (B08)
        nir: PathBuf,
        /// SWIR band (B12), resampled onto the NIR grid when needed
        swir: PathBuf,
        /// Red band (B04)
        red: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Prefix for output file names
        #[arg(short, long, default_value = "scene")]
        name: String,
        /// Skip the classification step
        #[arg(long)]
        no_classify: bool,
    },
}

#[derive(Subcommand)]
enum LocationCommands {
    /// Add a location
    Create {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List all locations
    List,
    /// Show one location
    Show { id: String },
    /// Replace a location's name, coordinates and description
    Update {
        id: String,
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a location
    Delete { id: String },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_record(record: &LocationRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

fn read_band(path: &Path) -> Result<Raster<f32>> {
    read_geotiff(path).with_context(|| format!("Failed to read band: {}", path.display()))
}

impl Cli {
    fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::from_env().context("Invalid GEOPULSE_* environment")?;
        if let Some(url) = &self.catalog_url {
            config.catalog_url = url.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }

    fn records(&self) -> JsonFileRecordStore {
        JsonFileRecordStore::new(&self.records)
    }

    fn blobs(&self, config: &PipelineConfig) -> Result<Arc<dyn BlobStore>> {
        match &self.blob_url {
            Some(url) => {
                let http = HttpClient::new(config.request_timeout)
                    .context("Failed to build HTTP client")?;
                let mut store = HttpBlobStore::new(url.clone(), http);
                if let Ok(token) = BearerToken::from_env("GEOPULSE_BLOB_TOKEN") {
                    store = store.with_auth(Arc::new(token) as Arc<dyn CloudAuth>);
                }
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(LocalBlobStore::new(&self.blob_root))),
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match &cli.command {
        // ── Process ──────────────────────────────────────────────────
        Commands::Process { location_id, date } => {
            let config = cli.config()?;
            let blobs = cli.blobs(&config)?;
            let ctx = PipelineContext::from_config(config, blobs, Arc::new(cli.records()))
                .context("Failed to set up pipeline")?;

            let mut request = ProcessRequest::post(location_id.clone());
            request.date = date.clone();

            let pb = spinner(&format!("Processing location {}...", location_id))?;
            let start = Instant::now();
            let response = handle_process(&ctx, request).await;
            pb.finish_and_clear();

            println!("{}", serde_json::to_string_pretty(&response)?);
            println!("  Processing time: {:.2?}", start.elapsed());
            if response.status_code >= 400 {
                bail!("processing failed with status {}", response.status_code);
            }
        }

        // ── Locations ────────────────────────────────────────────────
        Commands::Locations { action } => {
            let store = cli.records();
            match action {
                LocationCommands::Create {
                    name,
                    lat,
                    lon,
                    description,
                } => {
                    let input = LocationInput {
                        name: Some(name.clone()),
                        coordinates: Some(Coordinates::new(*lat, *lon)),
                        description: description.clone(),
                    };
                    let record = create_location(&store, input).await?;
                    print_record(&record)?;
                }
                LocationCommands::List => {
                    let records = list_locations(&store).await?;
                    if records.is_empty() {
                        println!("No locations in {}", cli.records.display());
                    }
                    for r in records {
                        println!(
                            "{}  {:<24} ({:.5}, {:.5})  {}",
                            r.id, r.name, r.coordinates.lat, r.coordinates.lon, r.status
                        );
                    }
                }
                LocationCommands::Show { id } => {
                    print_record(&get_location(&store, id).await?)?;
                }
                LocationCommands::Update {
                    id,
                    name,
                    lat,
                    lon,
                    description,
                } => {
                    let input = LocationInput {
                        name: Some(name.clone()),
                        coordinates: Some(Coordinates::new(*lat, *lon)),
                        description: description.clone(),
                    };
                    print_record(&update_location(&store, id, input).await?)?;
                }
                LocationCommands::Delete { id } => {
                    delete_location(&store, id).await?;
                    println!("Deleted {}", id);
                }
            }
        }

        // ── Search ───────────────────────────────────────────────────
        Commands::Search { lat, lon, date } => {
            let config = cli.config()?;
            let bbox = validate(Coordinates::new(*lat, *lon), config.radius, &config.allow_region)?;
            let date_range = date.as_deref().unwrap_or(&config.default_date_range);
            let catalog = StacSceneCatalog::from_config(&config)?;

            let pb = spinner("Searching catalog...")?;
            let scene = catalog.query(date_range, &bbox).await;
            pb.finish_and_clear();

            match scene? {
                Some(scene) => {
                    println!("Scene: {}", scene.id);
                    if let Some(cc) = scene.cloud_cover {
                        println!("Cloud cover: {:.2}%", cc);
                    }
                    println!("  NIR:  {}", scene.nir);
                    println!("  SWIR: {}", scene.swir);
                    println!("  Red:  {}", scene.red);
                }
                None => bail!("No suitable image found for {} in {}", bbox, date_range),
            }
        }

        // ── Indices ──────────────────────────────────────────────────
        Commands::Indices {
            nir,
            swir,
            red,
            output,
            name,
            no_classify,
        } => {
            let config = cli.config()?;
            std::fs::create_dir_all(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            let nir_band = read_band(nir)?;
            let red_band = read_band(red)?;
            let mut swir_band = read_band(swir)?;
            if nir_band.check_same_grid(&swir_band).is_err() {
                let gt = nir_band.transform();
                info!(
                    "Resampling SWIR from {} to {}",
                    swir_band.cell_size(),
                    gt.pixel_width.abs()
                );
                swir_band = resample_nearest(&swir_band, gt.pixel_width.abs(), gt.pixel_height.abs())
                    .context("Failed to resample SWIR")?;
            }

            let mut computed = Vec::with_capacity(SpectralIndex::ALL.len());
            for index in SpectralIndex::ALL {
                let other = match index {
                    SpectralIndex::Ndmi => &swir_band,
                    SpectralIndex::Msavi2 => &red_band,
                };
                let pb = spinner(&format!("Computing {}...", index))?;
                let start = Instant::now();
                let raster = index
                    .compute(&nir_band, other)
                    .with_context(|| format!("Failed to compute {}", index))?;
                let elapsed = start.elapsed();
                pb.finish_and_clear();

                let path = output.join(format!("{}_{}.tif", name, index.suffix()));
                write_geotiff(&raster, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                done(index.name(), &path, elapsed);
                computed.push(raster);
            }

            if !no_classify {
                let params = KmeansParams {
                    k: LAND_COVER_CLASSES,
                    seed: config.seed,
                    ..Default::default()
                };
                let pb = spinner("Classifying land cover...")?;
                let start = Instant::now();
                let labels = classify_indices(&computed[0], &computed[1], &params)
                    .context("Classification failed")?;
                let elapsed = start.elapsed();
                pb.finish_and_clear();

                let path = output.join(format!("{}_labels.tif", name));
                write_geotiff_u8(&labels, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                done("Land cover", &path, elapsed);
            }
        }
    }

    Ok(())
}

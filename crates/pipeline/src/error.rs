//! Pipeline errors and their mapping to response status codes.

use geopulse_cloud::CloudError;
use thiserror::Error;

use crate::status::ProcessingStatus;

/// Broad error class, which decides the response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or out-of-range input
    Validation,
    /// Location record or suitable scene absent
    NotFound,
    /// A remote collaborator failed
    Upstream,
    /// Raster I/O, resampling or classification failed
    Processing,
    MethodNotAllowed,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Processing => 500,
            ErrorKind::Upstream => 502,
        }
    }
}

/// Errors produced while processing a location.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid coordinates: lat={lat}, lon={lon}, radius={radius} is outside the supported region")]
    InvalidCoordinates { lat: f64, lon: f64, radius: f64 },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("location {0} not found")]
    LocationNotFound(String),

    #[error("no suitable image found for {date_range}")]
    NoSuitableImage { date_range: String },

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[source] CloudError),

    #[error("failed to download {band} band: {source}")]
    DownloadError {
        band: &'static str,
        #[source]
        source: CloudError,
    },

    #[error("blob store error for {key}: {reason}")]
    BlobStore { key: String, reason: String },

    #[error("record store error: {0}")]
    RecordStore(String),

    #[error("raster I/O failed for {path}: {source}")]
    RasterIO {
        path: String,
        #[source]
        source: geopulse_core::Error,
    },

    #[error("resampling {path} failed: {source}")]
    Resample {
        path: String,
        #[source]
        source: geopulse_core::Error,
    },

    #[error("classification failed: {0}")]
    Classification(#[source] geopulse_core::Error),

    #[error("status transition {from} -> {to} is not allowed")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidCoordinates { .. }
            | PipelineError::MissingField(_)
            | PipelineError::InvalidBody(_) => ErrorKind::Validation,
            PipelineError::LocationNotFound(_) | PipelineError::NoSuitableImage { .. } => {
                ErrorKind::NotFound
            }
            PipelineError::CatalogUnavailable(_)
            | PipelineError::DownloadError { .. }
            | PipelineError::BlobStore { .. }
            | PipelineError::RecordStore(_) => ErrorKind::Upstream,
            PipelineError::RasterIO { .. }
            | PipelineError::Resample { .. }
            | PipelineError::Classification(_)
            | PipelineError::InvalidTransition { .. } => ErrorKind::Processing,
            PipelineError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    pub(crate) fn blob(key: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::BlobStore {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn raster_io(path: &std::path::Path, source: geopulse_core::Error) -> Self {
        PipelineError::RasterIO {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

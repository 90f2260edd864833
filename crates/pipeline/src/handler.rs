//! Processing entry point: request in, status-coded response out.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::pipeline::{process_location, ProcessOutcome};

/// Trigger for one processing run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub location_id: Option<String>,
    /// STAC datetime interval; absent means the configured default
    pub date: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl ProcessRequest {
    pub fn post(location_id: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            location_id: Some(location_id.into()),
            date: None,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndmi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msavi2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
}

impl From<ProcessOutcome> for ProcessResponse {
    fn from(outcome: ProcessOutcome) -> Self {
        let message = outcome.message().to_string();
        let artifacts = outcome.artifacts().clone();
        Self {
            status_code: 200,
            message,
            ndmi: Some(artifacts.ndmi),
            msavi2: Some(artifacts.msavi2),
            labels: artifacts.labels,
        }
    }
}

impl From<PipelineError> for ProcessResponse {
    fn from(err: PipelineError) -> Self {
        Self {
            status_code: err.status_code(),
            message: err.to_string(),
            ndmi: None,
            msavi2: None,
            labels: None,
        }
    }
}

/// Check the method and fields, run the pipeline, map the result.
pub async fn handle_process(ctx: &PipelineContext, req: ProcessRequest) -> ProcessResponse {
    if !req.method.eq_ignore_ascii_case("POST") {
        return PipelineError::MethodNotAllowed(req.method).into();
    }
    let Some(location_id) = req.location_id.filter(|id| !id.is_empty()) else {
        return PipelineError::MissingField("locationId").into();
    };

    match process_location(ctx, &location_id, req.date.as_deref()).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            warn!(%location_id, status = e.status_code(), "request failed: {}", e);
            e.into()
        }
    }
}

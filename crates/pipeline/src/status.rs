//! Location processing status and its transitions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::Artifacts;
use crate::error::{PipelineError, Result};
use crate::store::{LocationRecord, RecordStore};

/// Lifecycle of a location record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// Stored but never processed. Older records carry `POINT_CREATED`.
    #[default]
    #[serde(alias = "POINT_CREATED")]
    Created,
    Processing,
    Processed,
    Failed,
}

impl ProcessingStatus {
    /// Whether a record may move from `self` to `next`.
    ///
    /// Nothing moves back to `Created`. Reprocessing starts from any other
    /// state, so a stuck `Processing` record can be retried.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (_, Created) => false,
            (Processing, Processed) | (Processing, Failed) => true,
            (_, Processing) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Created => "CREATED",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Processed => "PROCESSED",
            ProcessingStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists status transitions around a pipeline run.
#[derive(Clone)]
pub struct StatusTracker {
    records: Arc<dyn RecordStore>,
}

impl StatusTracker {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Copy of `record` moved to `next`, if the move is allowed.
    fn transition(record: &LocationRecord, next: ProcessingStatus) -> Result<LocationRecord> {
        if !record.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: record.status,
                to: next,
            });
        }
        let mut updated = record.clone();
        updated.status = next;
        Ok(updated)
    }

    /// Write `updated` and, once stored, adopt it as the caller's copy.
    async fn commit(&self, record: &mut LocationRecord, updated: LocationRecord) -> Result<()> {
        self.records.put(&updated).await?;
        *record = updated;
        info!(location_id = %record.id, status = %record.status, "status updated");
        Ok(())
    }

    pub async fn mark_processing(&self, record: &mut LocationRecord) -> Result<()> {
        let updated = Self::transition(record, ProcessingStatus::Processing)?;
        self.commit(record, updated).await
    }

    /// Record success along with what produced it, so a repeat request can be
    /// answered from the record alone.
    pub async fn mark_processed(
        &self,
        record: &mut LocationRecord,
        artifacts: &Artifacts,
        scene_id: &str,
        date_range: &str,
    ) -> Result<()> {
        let mut updated = Self::transition(record, ProcessingStatus::Processed)?;
        updated.ndmi = Some(artifacts.ndmi.clone());
        updated.msavi2 = Some(artifacts.msavi2.clone());
        updated.labels = artifacts.labels.clone();
        updated.scene_id = Some(scene_id.to_string());
        updated.date_range = Some(date_range.to_string());
        self.commit(record, updated).await
    }

    /// Best effort: a failure to write FAILED is logged, and the caller keeps
    /// reporting the original error.
    pub async fn mark_failed(&self, record: &mut LocationRecord) {
        let Ok(updated) = Self::transition(record, ProcessingStatus::Failed) else {
            return;
        };
        if let Err(e) = self.commit(record, updated).await {
            warn!(location_id = %record.id, error = %e, "could not record FAILED status");
        }
    }
}

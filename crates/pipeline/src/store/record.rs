//! Location records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{PipelineError, Result};
use crate::status::ProcessingStatus;
use crate::validator::Coordinates;

/// A stored point of interest and the state of its processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    #[serde(rename = "LocationID")]
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ndmi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msavi2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    /// Scene behind the stored artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    /// Date range the scene was selected for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
}

impl LocationRecord {
    /// A fresh record in `CREATED` state.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinates: Coordinates,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinates,
            description: description.into(),
            status: ProcessingStatus::Created,
            ndmi: None,
            msavi2: None,
            labels: None,
            scene_id: None,
            date_range: None,
        }
    }
}

/// Keyed storage for location records. Writes replace the whole record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<LocationRecord>>;
    async fn put(&self, record: &LocationRecord) -> Result<()>;
    async fn list(&self) -> Result<Vec<LocationRecord>>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Records held in process memory.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<String, LocationRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = LocationRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &str) -> Result<Option<LocationRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: &LocationRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LocationRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

/// Records kept as a JSON array in one file.
///
/// Every write rewrites the file through a temporary sibling and a rename.
/// The lock only serializes writers within this process.
pub struct JsonFileRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn store_err(&self, what: &str, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::RecordStore(format!("{} {}: {}", what, self.path.display(), e))
    }

    async fn load(&self) -> Result<BTreeMap<String, LocationRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.store_err("reading", e)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let records: Vec<LocationRecord> =
            serde_json::from_str(&text).map_err(|e| self.store_err("parsing", e))?;
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    async fn save(&self, records: &BTreeMap<String, LocationRecord>) -> Result<()> {
        let list: Vec<&LocationRecord> = records.values().collect();
        let body = serde_json::to_vec_pretty(&list).map_err(|e| self.store_err("encoding", e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.store_err("creating directory for", e))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.store_err("writing", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.store_err("replacing", e))
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn get(&self, id: &str) -> Result<Option<LocationRecord>> {
        Ok(self.load().await?.remove(id))
    }

    async fn put(&self, record: &LocationRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.id.clone(), record.clone());
        self.save(&records).await
    }

    async fn list(&self) -> Result<Vec<LocationRecord>> {
        Ok(self.load().await?.into_values().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let removed = records.remove(id).is_some();
        if removed {
            self.save(&records).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> LocationRecord {
        LocationRecord::new(id, "Field", Coordinates::new(37.0463, 31.1018), "wheat")
    }

    #[test]
    fn wire_shape() {
        let mut r = record("abc");
        r.ndmi = Some("file:///blobs/S_ndmi.tif".into());
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(json["LocationID"], "abc");
        assert_eq!(json["coordinates"]["lat"], 37.0463);
        assert_eq!(json["status"], "CREATED");
        assert_eq!(json["ndmi"], "file:///blobs/S_ndmi.tif");
        assert!(json.get("msavi2").is_none());

        let legacy: LocationRecord = serde_json::from_str(
            r#"{"LocationID":"x","name":"n","coordinates":{"lat":1.0,"lon":2.0},"description":"d","status":"POINT_CREATED"}"#,
        )
        .unwrap();
        assert_eq!(legacy.status, ProcessingStatus::Created);
        assert_eq!(legacy.scene_id, None);
    }

    #[tokio::test]
    async fn in_memory_crud() {
        let store = InMemoryRecordStore::with_records([record("b"), record("a")]);
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_file_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records").join("locations.json");

        let store = JsonFileRecordStore::new(&path);
        assert!(store.list().await.unwrap().is_empty());
        store.put(&record("one")).await.unwrap();
        let mut two = record("two");
        two.status = ProcessingStatus::Processed;
        store.put(&two).await.unwrap();

        let reopened = JsonFileRecordStore::new(&path);
        let ids: Vec<String> = reopened.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["one", "two"]);
        assert_eq!(
            reopened.get("two").await.unwrap().unwrap().status,
            ProcessingStatus::Processed
        );

        assert!(reopened.delete("one").await.unwrap());
        assert!(store.get("one").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_record_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locations.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileRecordStore::new(&path).list().await.unwrap_err();
        assert!(matches!(err, PipelineError::RecordStore(_)));
        assert_eq!(err.status_code(), 502);
    }
}

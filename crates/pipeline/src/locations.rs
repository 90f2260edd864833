//! Location records service: create, list, get, update, delete.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::store::{LocationRecord, RecordStore};
use crate::validator::Coordinates;

/// Client-supplied fields of a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub description: String,
}

impl LocationInput {
    fn require(self) -> Result<(String, Coordinates, String)> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(PipelineError::MissingField("name"))?;
        let coordinates = self
            .coordinates
            .ok_or(PipelineError::MissingField("coordinates"))?;
        Ok((name, coordinates, self.description))
    }
}

/// Store a new record in `CREATED` state under a fresh UUID.
pub async fn create_location(records: &dyn RecordStore, input: LocationInput) -> Result<LocationRecord> {
    let (name, coordinates, description) = input.require()?;
    let record = LocationRecord::new(Uuid::new_v4().to_string(), name, coordinates, description);
    records.put(&record).await?;
    info!(location_id = %record.id, "location created");
    Ok(record)
}

pub async fn list_locations(records: &dyn RecordStore) -> Result<Vec<LocationRecord>> {
    records.list().await
}

pub async fn get_location(records: &dyn RecordStore, id: &str) -> Result<LocationRecord> {
    records
        .get(id)
        .await?
        .ok_or_else(|| PipelineError::LocationNotFound(id.to_string()))
}

/// Replace name, coordinates and description.
///
/// Status and artifact references are kept until the next run. Moving the
/// point drops the scene the record was processed for, so the next request
/// searches the catalog again instead of answering from the record.
pub async fn update_location(
    records: &dyn RecordStore,
    id: &str,
    input: LocationInput,
) -> Result<LocationRecord> {
    let (name, coordinates, description) = input.require()?;
    let mut record = get_location(records, id).await?;
    if record.coordinates != coordinates {
        record.scene_id = None;
        record.date_range = None;
    }
    record.name = name;
    record.coordinates = coordinates;
    record.description = description;
    records.put(&record).await?;
    info!(location_id = %id, "location updated");
    Ok(record)
}

pub async fn delete_location(records: &dyn RecordStore, id: &str) -> Result<()> {
    if !records.delete(id).await? {
        return Err(PipelineError::LocationNotFound(id.to_string()));
    }
    info!(location_id = %id, "location deleted");
    Ok(())
}

/// Method-dispatched request against the records service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationRequest {
    pub method: String,
    pub id: Option<String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<LocationRecord>>,
}

impl LocationResponse {
    fn ok(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            location: None,
            locations: None,
        }
    }

    fn with_location(mut self, record: LocationRecord) -> Self {
        self.location = Some(record);
        self
    }
}

impl From<PipelineError> for LocationResponse {
    fn from(err: PipelineError) -> Self {
        Self::ok(err.status_code(), err.to_string())
    }
}

/// GET with an id shows one record, GET without lists all; POST creates,
/// PUT updates, DELETE removes.
pub async fn handle_locations(records: &dyn RecordStore, req: LocationRequest) -> LocationResponse {
    match dispatch(records, req).await {
        Ok(resp) => resp,
        Err(e) => e.into(),
    }
}

async fn dispatch(records: &dyn RecordStore, req: LocationRequest) -> Result<LocationResponse> {
    let method = req.method.to_ascii_uppercase();
    match (method.as_str(), req.id) {
        ("GET", None) => {
            let all = list_locations(records).await?;
            let mut resp = LocationResponse::ok(200, format!("{} locations", all.len()));
            resp.locations = Some(all);
            Ok(resp)
        }
        ("GET", Some(id)) => {
            let record = get_location(records, &id).await?;
            Ok(LocationResponse::ok(200, "Location found").with_location(record))
        }
        ("POST", _) => {
            let record = create_location(records, parse_body(req.body)?).await?;
            Ok(LocationResponse::ok(201, "Location created").with_location(record))
        }
        ("PUT", Some(id)) => {
            let record = update_location(records, &id, parse_body(req.body)?).await?;
            Ok(LocationResponse::ok(200, "Location updated").with_location(record))
        }
        ("DELETE", Some(id)) => {
            delete_location(records, &id).await?;
            Ok(LocationResponse::ok(200, "Location deleted"))
        }
        ("PUT" | "DELETE", None) => Err(PipelineError::MissingField("id")),
        _ => Err(PipelineError::MethodNotAllowed(req.method)),
    }
}

fn parse_body(body: Option<serde_json::Value>) -> Result<LocationInput> {
    let body = body.ok_or(PipelineError::MissingField("body"))?;
    serde_json::from_value(body).map_err(|e| PipelineError::InvalidBody(e.to_string()))
}

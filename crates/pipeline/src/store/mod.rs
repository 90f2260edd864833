//! Record and blob storage seams with their concrete backends.

mod blob;
mod record;

pub use blob::{BlobStore, HttpBlobStore, LocalBlobStore};
pub use record::{InMemoryRecordStore, JsonFileRecordStore, LocationRecord, RecordStore};

//! Processed store: completed items with their result and artifact paths

use super::durable;
use super::pending::REQUEST_PREFIX;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use cubeport_common::{Stage, WorkItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PROCESSED_PREFIX: &str = "processed";

/// On-disk form of a processed item: the pending envelope plus the outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub request_id: String,
    pub timestamp: String,
    pub received_at: DateTime<Utc>,
    pub status: Stage,
    pub processed_at: DateTime<Utc>,
    pub payload: Value,
    pub artifacts: Vec<PathBuf>,
    pub result: Value,
}

impl ProcessedRecord {
    pub fn new(item: &WorkItem, result: Value, artifacts: Vec<PathBuf>) -> Self {
        Self {
            request_id: item.id.clone(),
            timestamp: item.timestamp.clone(),
            received_at: item.created_at,
            status: Stage::Processed,
            processed_at: Utc::now(),
            payload: item.payload.clone(),
            artifacts,
            result,
        }
    }

    /// Whether this record is the outcome of `item` rather than of an earlier
    /// file that happened to share its name
    pub fn is_for(&self, item: &WorkItem) -> bool {
        self.request_id == item.id && self.payload == item.payload
    }
}

/// Processed record name for a pending key: `request_<ts>_<id>.json` becomes
/// `processed_<ts>_<id>.json`; any other name gains a `processed_` prefix.
pub fn processed_key(pending_key: &str) -> String {
    match pending_key.strip_prefix(REQUEST_PREFIX) {
        Some(rest) if rest.starts_with('_') => format!("{PROCESSED_PREFIX}{rest}"),
        _ => format!("{PROCESSED_PREFIX}_{pending_key}"),
    }
}

/// Directory of processed records
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    dir: PathBuf,
}

impl ProcessedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the processed record for the pending item `pending_key`
    pub fn path_for(&self, pending_key: &str) -> PathBuf {
        self.dir.join(processed_key(pending_key))
    }

    pub fn contains(&self, pending_key: &str) -> bool {
        self.path_for(pending_key).is_file()
    }

    /// Persist `record` durably for the pending item `pending_key`
    pub fn put(&self, pending_key: &str, record: &ProcessedRecord) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(pending_key);
        let bytes = serde_json::to_vec_pretty(record).map_err(|source| PersistenceError::Serialize {
            path: path.clone(),
            source,
        })?;

        durable::write(&path, &bytes).map_err(|e| PersistenceError::io(&path, e))?;
        debug!(request_id = %record.request_id, path = %path.display(), "Processed record written");
        Ok(path)
    }

    pub fn get(&self, pending_key: &str) -> Result<ProcessedRecord, PersistenceError> {
        let path = self.path_for(pending_key);
        let text = fs::read_to_string(&path).map_err(|e| PersistenceError::io(&path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| PersistenceError::corrupt(&path, format!("invalid processed record: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::pending::new_item;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_processed_key() {
        assert_eq!(
            processed_key("request_20250101_120000_ab12cd34.json"),
            "processed_20250101_120000_ab12cd34.json"
        );
        assert_eq!(processed_key("manual.json"), "processed_manual.json");
        assert_eq!(processed_key("requests.json"), "processed_requests.json");
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = ProcessedStore::new(dir.path());
        let item = new_item(json!({"cargo": "box"}), Utc::now());
        let record = ProcessedRecord::new(
            &item,
            json!({"loadSummary": {"piecesLoaded": 4}}),
            vec![PathBuf::from("exports/x.csv")],
        );

        let path = store.put(&item.key, &record).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("processed_"));
        assert!(store.contains(&item.key));

        let loaded = store.get(&item.key).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.status, Stage::Processed);
    }
}

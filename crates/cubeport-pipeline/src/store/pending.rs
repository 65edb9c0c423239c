//! Pending store: submitted payloads awaiting export

use super::durable;
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use cubeport_common::{Stage, WorkItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const REQUEST_PREFIX: &str = "request";

/// Timestamp format used in every generated file name
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ID_LEN: usize = 8;
const RECORD_EXTENSION: &str = "json";

/// On-disk form of a pending item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEnvelope {
    pub request_id: String,
    pub timestamp: String,
    pub received_at: DateTime<Utc>,
    pub status: Stage,
    pub payload: Value,
}

impl From<&WorkItem> for PendingEnvelope {
    fn from(item: &WorkItem) -> Self {
        Self {
            request_id: item.id.clone(),
            timestamp: item.timestamp.clone(),
            received_at: item.created_at,
            status: Stage::Pending,
            payload: item.payload.clone(),
        }
    }
}

/// Create a fresh work item for `payload` received at `now`
pub fn new_item(payload: Value, now: DateTime<Utc>) -> WorkItem {
    let id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(ID_LEN).collect();
    let timestamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();

    WorkItem {
        key: format!("{REQUEST_PREFIX}_{timestamp}_{id}.{RECORD_EXTENSION}"),
        export_name: format!("{timestamp}_{id}"),
        id,
        timestamp,
        created_at: now,
        payload,
        stage: Stage::Pending,
    }
}

/// Directory of `*.json` pending records
#[derive(Debug, Clone)]
pub struct PendingStore {
    dir: PathBuf,
}

impl PendingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    /// Persist `item` durably under its key
    pub fn put(&self, item: &WorkItem) -> Result<PathBuf, PersistenceError> {
        let path = self.path(&item.key);
        let bytes = serde_json::to_vec_pretty(&PendingEnvelope::from(item)).map_err(|source| {
            PersistenceError::Serialize {
                path: path.clone(),
                source,
            }
        })?;

        durable::write(&path, &bytes).map_err(|e| PersistenceError::io(&path, e))?;
        debug!(request_id = %item.id, path = %path.display(), "Pending record written");
        Ok(path)
    }

    /// Keys of all pending records, in lexical order
    pub fn list(&self) -> Result<Vec<String>, PersistenceError> {
        let unavailable = |source| PersistenceError::Unavailable {
            path: self.dir.clone(),
            source,
        };

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if durable::is_staging_name(&name)
                || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION)
                || !path.is_file()
            {
                continue;
            }
            keys.push(name);
        }

        keys.sort();
        Ok(keys)
    }

    /// Read the item stored under `key`.
    ///
    /// A file holding a pending envelope yields that item. Any other JSON
    /// document is treated as a bare payload, identified by its file stem.
    pub fn load(&self, key: &str) -> Result<WorkItem, PersistenceError> {
        let path = self.path(key);
        let text = fs::read_to_string(&path).map_err(|e| PersistenceError::io(&path, e))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| PersistenceError::corrupt(&path, format!("invalid JSON: {e}")))?;

        let stem = Path::new(key)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());

        if let Some(envelope) = as_envelope(&value) {
            return Ok(WorkItem {
                id: envelope.request_id,
                timestamp: envelope.timestamp,
                created_at: envelope.received_at,
                payload: envelope.payload,
                stage: Stage::Pending,
                key: key.to_string(),
                export_name: stem,
            });
        }

        let created_at: DateTime<Utc> = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        debug!(path = %path.display(), "Pending file is a bare payload");
        Ok(WorkItem {
            id: stem.clone(),
            timestamp: created_at.format(FILE_TIMESTAMP_FORMAT).to_string(),
            created_at,
            payload: value,
            stage: Stage::Pending,
            key: key.to_string(),
            export_name: stem,
        })
    }

    /// Delete the record under `key` durably
    pub fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path(key);
        durable::remove(&path).map_err(|e| PersistenceError::io(&path, e))
    }
}

fn as_envelope(value: &Value) -> Option<PendingEnvelope> {
    let fields = value.as_object()?;
    if !fields.contains_key("request_id") || !fields.contains_key("payload") {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

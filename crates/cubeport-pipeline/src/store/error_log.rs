//! Out-of-band error records for failed items
//!
//! Writing a record is best effort: a failure here is logged and swallowed so
//! it never masks the error being recorded.

use super::durable;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

pub const ERROR_PREFIX: &str = "error";
const ERROR_EXTENSION: &str = "log";

#[derive(Debug, Serialize)]
struct ErrorRecord<'a> {
    request_id: &'a str,
    timestamp: &'a str,
    error_at: String,
    error_kind: &'a str,
    error_message: &'a str,
}

/// Directory of `error_<timestamp>_<id>.log` records
#[derive(Debug, Clone)]
pub struct ErrorLog {
    dir: PathBuf,
}

impl ErrorLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record a failure. Returns the record path, or `None` if it could not
    /// be written.
    pub fn record(&self, request_id: &str, timestamp: &str, kind: &str, message: &str) -> Option<PathBuf> {
        let path = self
            .dir
            .join(format!("{ERROR_PREFIX}_{timestamp}_{request_id}.{ERROR_EXTENSION}"));
        let record = ErrorRecord {
            request_id,
            timestamp,
            error_at: Utc::now().to_rfc3339(),
            error_kind: kind,
            error_message: message,
        };

        let written = fs::create_dir_all(&self.dir)
            .and_then(|_| serde_json::to_vec_pretty(&record).map_err(std::io::Error::from))
            .and_then(|bytes| durable::write(&path, &bytes));

        match written {
            Ok(()) => {
                error!(request_id, kind, message, path = %path.display(), "Item failed, error recorded");
                Some(path)
            }
            Err(e) => {
                warn!(request_id, error = %e, "Could not write error record");
                None
            }
        }
    }
}

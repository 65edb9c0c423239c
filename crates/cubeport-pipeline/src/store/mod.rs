//! File-backed stores for the work-item lifecycle
//!
//! ```text
//! <data_dir>/
//!   json_pending/     request_<ts>_<id>.json      submitted, not yet exported
//!   json_processed/   processed_<ts>_<id>.json    exported, with result
//!   exports/          <name>.csv | <name>.xlsx    artifacts
//!   errors/           error_<ts>_<id>.log         failure records
//! ```
//!
//! All writes go through [`durable`], so each file is either absent or
//! complete.

pub mod durable;
pub mod error_log;
pub mod pending;
pub mod processed;

pub use error_log::ErrorLog;
pub use pending::{new_item, PendingEnvelope, PendingStore};
pub use processed::{processed_key, ProcessedRecord, ProcessedStore};

use crate::config::PipelineConfig;
use crate::error::PersistenceError;
use std::fs;
use std::path::{Path, PathBuf};

/// The stores of one data directory
#[derive(Debug, Clone)]
pub struct Stores {
    pub pending: PendingStore,
    pub processed: ProcessedStore,
    pub errors: ErrorLog,
    exports_dir: PathBuf,
}

impl Stores {
    /// Open the stores described by `config`, creating directories as needed
    pub fn open(config: &PipelineConfig) -> Result<Self, PersistenceError> {
        let stores = Self {
            pending: PendingStore::new(config.pending_dir()),
            processed: ProcessedStore::new(config.processed_dir()),
            errors: ErrorLog::new(config.errors_dir()),
            exports_dir: config.exports_dir(),
        };

        for dir in [
            stores.pending.dir(),
            stores.processed.dir(),
            stores.errors.dir(),
            stores.exports_dir.as_path(),
        ] {
            fs::create_dir_all(dir).map_err(|source| PersistenceError::Unavailable {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        Ok(stores)
    }

    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new("http://localhost", "t").with_data_dir(dir.path());

        let stores = Stores::open(&config).unwrap();
        for sub in ["json_pending", "json_processed", "exports", "errors"] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }
        assert_eq!(stores.exports_dir(), dir.path().join("exports"));
    }
}

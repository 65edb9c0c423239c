//! Durable pending → processed state machine
//!
//! An item is written to the pending store before anything else happens. It
//! leaves the pending store only after its artifact and its processed record
//! are both on disk, so a crash at any point leaves it recoverable from at
//! least one store. Failures leave the pending record untouched and write an
//! error record beside it.

use crate::config::PipelineConfig;
use crate::error::{PersistenceError, PipelineError, Result, SubmissionError};
use crate::export::{export, ExportArtifact, ExportMode};
use crate::flatten::flatten;
use crate::remote::{CubeMasterClient, Optimizer};
use crate::store::{new_item, ProcessedRecord, Stores};
use chrono::Utc;
use cubeport_common::{HealthStatus, Stage, SubmissionReceipt, WorkItem};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a successful [`Pipeline::advance`]
#[derive(Debug, Clone)]
pub struct Advanced {
    /// The item, now at [`Stage::Processed`]
    pub item: WorkItem,
    pub artifact: ExportArtifact,
    pub processed_record: PathBuf,
}

impl From<Advanced> for SubmissionReceipt {
    fn from(advanced: Advanced) -> Self {
        let total_rows = advanced.artifact.total_rows();
        SubmissionReceipt {
            request_id: advanced.item.id,
            timestamp: advanced.item.timestamp,
            artifacts: vec![advanced.artifact.path],
            processed_record: advanced.processed_record,
            tables: advanced.artifact.tables,
            total_rows,
        }
    }
}

/// Drives work items from submission to export
pub struct Pipeline {
    optimizer: Arc<dyn Optimizer>,
    stores: Stores,
    export_mode: ExportMode,
    reconcile_concurrency: usize,
}

impl Pipeline {
    /// Build a pipeline over `optimizer`, opening the stores under the
    /// configured data directory
    pub fn new(config: &PipelineConfig, optimizer: Arc<dyn Optimizer>) -> Result<Self, PersistenceError> {
        Ok(Self {
            optimizer,
            stores: Stores::open(config)?,
            export_mode: config.export_mode,
            reconcile_concurrency: config.reconcile_concurrency.max(1),
        })
    }

    /// Build a pipeline that talks to the CubeMaster API
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = CubeMasterClient::new(config)?;
        Ok(Self::new(config, Arc::new(client))?)
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn export_mode(&self) -> ExportMode {
        self.export_mode
    }

    pub(crate) fn reconcile_concurrency(&self) -> usize {
        self.reconcile_concurrency
    }

    /// Persist `payload` as a new pending item. The record is durable when
    /// this returns.
    pub async fn submit(&self, payload: Value) -> Result<WorkItem, PersistenceError> {
        let item = new_item(payload, Utc::now());
        self.persist(&item).await?;
        Ok(item)
    }

    async fn persist(&self, item: &WorkItem) -> Result<(), PersistenceError> {
        let stores = self.stores.clone();
        let owned = item.clone();
        let path = stores.pending.path(&item.key);

        blocking(path, move || stores.pending.put(&owned).map(|_| ())).await?;

        info!(request_id = %item.id, key = %item.key, "Request persisted as pending");
        Ok(())
    }

    /// Export `result` for `item` and move the item to the processed store.
    ///
    /// Order: artifact, processed record, then removal of the pending record.
    /// On failure the pending record is left in place and an error record is
    /// written.
    #[instrument(skip_all, fields(request_id = %item.id))]
    pub async fn advance(&self, item: WorkItem, result: Value) -> Result<Advanced> {
        let stores = self.stores.clone();
        let mode = self.export_mode;
        let path = stores.pending.path(&item.key);
        let failed = item.clone();

        match blocking(path, move || commit(&stores, mode, item, result)).await {
            Ok(advanced) => Ok(advanced),
            Err(e) => Err(self.record_failure(&failed, e).await),
        }
    }

    /// Call the optimizer for a pending item and advance it
    pub async fn process(&self, item: WorkItem) -> Result<Advanced> {
        debug!(request_id = %item.id, "Calling optimization service");
        let result = match self.optimizer.optimize(&item.payload).await {
            Ok(result) => result,
            Err(e) => return Err(self.record_failure(&item, e.into()).await),
        };
        self.advance(item, result).await
    }

    /// Persist, optimize and export one payload
    pub async fn submit_and_process(&self, payload: Value) -> Result<SubmissionReceipt, SubmissionError> {
        let item = new_item(payload, Utc::now());
        let tag = |source: PipelineError| SubmissionError {
            request_id: item.id.clone(),
            timestamp: item.timestamp.clone(),
            source,
        };

        self.persist(&item).await.map_err(|e| tag(e.into()))?;
        let advanced = self.process(item.clone()).await.map_err(tag)?;

        info!(
            request_id = %advanced.item.id,
            artifact = %advanced.artifact.path.display(),
            rows = advanced.artifact.total_rows(),
            "Request processed"
        );
        Ok(advanced.into())
    }

    /// Probe the optimization service
    pub async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            remote_reachable: self.optimizer.ping().await,
        }
    }

    pub(crate) async fn record_failure(&self, item: &WorkItem, error: PipelineError) -> PipelineError {
        self.record_error(&item.id, &item.timestamp, &error).await;
        error
    }

    /// Write an error record off the runtime threads. Best effort, like the
    /// record itself.
    pub(crate) async fn record_error(&self, request_id: &str, timestamp: &str, error: &PipelineError) {
        let errors = self.stores.errors.clone();
        let (request_id, timestamp) = (request_id.to_string(), timestamp.to_string());
        let (kind, message) = (error.kind(), error.to_string());

        let written = tokio::task::spawn_blocking(move || {
            errors.record(&request_id, &timestamp, kind, &message);
        })
        .await;
        if let Err(e) = written {
            warn!(error = %e, "Error record task did not complete");
        }
    }
}

fn commit(stores: &Stores, mode: ExportMode, item: WorkItem, result: Value) -> Result<Advanced> {
    let tables = flatten(&result)?;
    let artifact = export(&tables, stores.exports_dir(), &item.export_name, mode)?;

    let record = ProcessedRecord::new(&item, result, vec![artifact.path.clone()]);
    let processed_record = stores.processed.put(&item.key, &record)?;

    remove_pending(stores, &item.key)?;

    Ok(Advanced {
        item: item.with_stage(Stage::Processed),
        artifact,
        processed_record,
    })
}

/// Run blocking store IO on the blocking pool. A task that panics or is
/// cancelled surfaces as an IO error on `path`.
pub(crate) async fn blocking<T, E, F>(path: PathBuf, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(PersistenceError::io(path, io::Error::other(e)).into()))
}

/// Remove a pending record whose processed record is already durable. A
/// record that is already gone counts as removed.
pub(crate) fn remove_pending(stores: &Stores, key: &str) -> Result<(), PersistenceError> {
    match stores.pending.remove(key) {
        Err(PersistenceError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!(key, "Pending record already removed");
            Ok(())
        }
        other => other,
    }
}

/// Flatten and export a saved result without touching the stores
pub fn export_result(result: &Value, dir: &Path, base_name: &str, mode: ExportMode) -> Result<ExportArtifact> {
    let tables = flatten(result)?;
    Ok(export(&tables, dir, base_name, mode)?)
}

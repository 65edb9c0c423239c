//! Batch reconciler for the pending backlog
//!
//! Every `*.json` file in the pending store is driven through the pipeline in
//! lexical key order. Items are independent: one failure is recorded in its
//! outcome and the batch continues. Only a store that cannot be listed aborts
//! the run.

use crate::error::{PersistenceError, PipelineError};
use crate::pipeline::{blocking, remove_pending, Advanced, Pipeline};
use crate::store::pending::FILE_TIMESTAMP_FORMAT;
use crate::store::{ProcessedRecord, Stores};
use chrono::Utc;
use cubeport_common::{BatchResult, ItemOutcome, Stage, WorkItem};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{info, warn};

impl Pipeline {
    /// Process every item in the pending store. See [`process_backlog`].
    pub async fn reconcile_pending(&self) -> Result<BatchResult, PersistenceError> {
        process_backlog(self).await
    }
}

/// Process every pending item, at most `reconcile_concurrency` at a time.
///
/// Outcomes are reported in key order regardless of completion order.
pub async fn process_backlog(pipeline: &Pipeline) -> Result<BatchResult, PersistenceError> {
    let stores = pipeline.stores().clone();
    let root = stores.pending.dir().to_path_buf();
    let keys = blocking(root, move || stores.pending.list()).await?;
    if keys.is_empty() {
        info!("No pending items to reconcile");
        return Ok(BatchResult::new());
    }

    info!(
        pending = keys.len(),
        concurrency = pipeline.reconcile_concurrency(),
        "Reconciling pending items"
    );

    let result: BatchResult = stream::iter(keys)
        .map(move |key| reconcile_item(pipeline, key))
        .buffered(pipeline.reconcile_concurrency())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    info!(
        total = result.total,
        succeeded = result.succeeded,
        failed = result.failed,
        "Reconciliation finished"
    );
    Ok(result)
}

async fn reconcile_item(pipeline: &Pipeline, key: String) -> ItemOutcome {
    let stores = pipeline.stores().clone();
    let path = stores.pending.path(&key);
    let lookup = {
        let key = key.clone();
        blocking(path, move || inspect(&stores, &key)).await
    };

    let (item, previous) = match lookup {
        Ok(found) => found,
        Err(e) => {
            let id = stem(&key);
            let timestamp = Utc::now().format(FILE_TIMESTAMP_FORMAT).to_string();
            let e = PipelineError::from(e);
            pipeline.record_error(&id, &timestamp, &e).await;
            return failed(id, key, &e);
        }
    };

    if let Some(record) = previous.filter(|record| record.is_for(&item)) {
        return recover(pipeline, key, record).await;
    }

    let id = item.id.clone();
    match pipeline.process(item).await {
        Ok(advanced) => processed(key, advanced),
        Err(e) => {
            warn!(request_id = %id, key = %key, error = %e, "Pending item failed, left for retry");
            failed(id, key, &e)
        }
    }
}

/// Load the pending item under `key` and any processed record stored under
/// the same name. An unreadable processed record is ignored: the item is
/// processed again and the record rewritten.
fn inspect(
    stores: &Stores,
    key: &str,
) -> Result<(WorkItem, Option<ProcessedRecord>), PersistenceError> {
    let item = stores.pending.load(key)?;
    if !stores.processed.contains(key) {
        return Ok((item, None));
    }

    match stores.processed.get(key) {
        Ok(record) => Ok((item, Some(record))),
        Err(e) => {
            warn!(key, error = %e, "Ignoring unreadable processed record");
            Ok((item, None))
        }
    }
}

/// Finish an advance that was interrupted after the processed record was
/// written: only the pending copy is left to remove.
async fn recover(pipeline: &Pipeline, key: String, record: ProcessedRecord) -> ItemOutcome {
    let stores = pipeline.stores().clone();
    let path = stores.pending.path(&key);
    let removed = {
        let key = key.clone();
        blocking(path, move || remove_pending(&stores, &key)).await
    };

    match removed {
        Ok(()) => {
            info!(request_id = %record.request_id, key = %key, "Recovered interrupted item");
            ItemOutcome {
                id: record.request_id,
                file: key,
                stage: Stage::Processed,
                error: None,
                artifacts: record.artifacts,
                tables: Vec::new(),
                recovered: true,
            }
        }
        Err(e) => {
            let e = PipelineError::from(e);
            warn!(key = %key, error = %e, "Could not recover interrupted item");
            failed(record.request_id, key, &e)
        }
    }
}

fn processed(key: String, advanced: Advanced) -> ItemOutcome {
    ItemOutcome {
        id: advanced.item.id,
        file: key,
        stage: Stage::Processed,
        error: None,
        artifacts: vec![advanced.artifact.path],
        tables: advanced.artifact.tables,
        recovered: false,
    }
}

fn failed(id: String, key: String, error: &PipelineError) -> ItemOutcome {
    ItemOutcome {
        id,
        file: key,
        stage: Stage::Failed,
        error: Some(error.to_string()),
        artifacts: Vec::new(),
        tables: Vec::new(),
        recovered: false,
    }
}

fn stem(key: &str) -> String {
    Path::new(key)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.to_string())
}

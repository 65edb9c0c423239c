//! End-to-end tests for the pipeline state machine and the batch reconciler
//!
//! A scripted optimizer stands in for the remote service: payloads carrying
//! `"fail": <status>` are rejected with that status, everything else is
//! answered with the payload's `"answer"` field.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use cubeport_common::Stage;
use cubeport_pipeline::store::{processed_key, ProcessedRecord};
use cubeport_pipeline::{
    ExportMode, Optimizer, Pipeline, PipelineConfig, PipelineError, RemoteCallError,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct ScriptedOptimizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Optimizer for ScriptedOptimizer {
    async fn optimize(&self, payload: &Value) -> Result<Value, RemoteCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = payload.get("fail").and_then(Value::as_u64) {
            return Err(RemoteCallError::Status {
                status: status as u16,
                message: "scripted failure".to_string(),
            });
        }
        Ok(payload.get("answer").cloned().unwrap_or(Value::Null))
    }

    async fn ping(&self) -> bool {
        true
    }
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig::new("http://optimizer.invalid/loads", "token").with_data_dir(dir)
}

fn open(dir: &Path, optimizer: Arc<ScriptedOptimizer>) -> Pipeline {
    Pipeline::new(&config(dir), optimizer).unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn answer(n: i64) -> Value {
    json!({
        "answer": {
            "filledContainers": [{"sequence": n, "name": "40ft"}],
            "loadSummary": {"piecesLoaded": n}
        }
    })
}

#[tokio::test]
async fn test_batch_with_one_remote_failure() {
    let dir = TempDir::new().unwrap();
    let optimizer = Arc::new(ScriptedOptimizer::default());
    let pipeline = open(dir.path(), optimizer.clone());
    let pending = dir.path().join("json_pending");

    fs::write(pending.join("item_1.json"), answer(1).to_string()).unwrap();
    fs::write(pending.join("item_2.json"), json!({"fail": 503}).to_string()).unwrap();
    fs::write(pending.join("item_3.json"), answer(3).to_string()).unwrap();

    let result = pipeline.reconcile_pending().await.unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 3);

    let ids: Vec<&str> = result.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["item_1", "item_2", "item_3"]);
    assert_eq!(result.outcomes[1].stage, Stage::Failed);
    assert!(result.outcomes[1].error.as_deref().unwrap().contains("503"));

    // Item 2 stays pending, the others moved
    assert_eq!(file_names(&pending), vec!["item_2.json"]);
    assert_eq!(
        file_names(&dir.path().join("json_processed")),
        vec!["processed_item_1.json", "processed_item_3.json"]
    );
    assert_eq!(
        file_names(&dir.path().join("exports")),
        vec!["item_1.csv", "item_3.csv"]
    );
    assert_eq!(
        file_names(&dir.path().join("errors")).len(),
        1,
        "the failed item gets an error record"
    );
}

#[tokio::test]
async fn test_failed_item_is_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));
    let pending = dir.path().join("json_pending");

    fs::write(pending.join("retry.json"), json!({"fail": 500}).to_string()).unwrap();
    assert_eq!(pipeline.reconcile_pending().await.unwrap().failed, 1);

    // The operator fixes the payload in place
    fs::write(pending.join("retry.json"), answer(7).to_string()).unwrap();
    let result = pipeline.reconcile_pending().await.unwrap();

    assert_eq!(result.succeeded, 1);
    assert!(file_names(&pending).is_empty());
}

#[tokio::test]
async fn test_submitted_item_survives_restart() {
    let dir = TempDir::new().unwrap();

    let key = {
        let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));
        let item = pipeline.submit(answer(1)).await.unwrap();
        item.key
        // Pipeline dropped here, as if the process had been killed
    };

    let restarted = open(dir.path(), Arc::new(ScriptedOptimizer::default()));
    assert_eq!(restarted.stores().pending.list().unwrap(), vec![key.clone()]);

    let result = restarted.reconcile_pending().await.unwrap();
    assert_eq!(result.succeeded, 1);
    assert!(!restarted.stores().pending.contains(&key));
    assert!(restarted.stores().processed.contains(&key));

    // Reprocessed envelopes export under the pending file's name
    let export = format!("{}.csv", key.trim_end_matches(".json"));
    assert_eq!(file_names(&dir.path().join("exports")), vec![export]);
}

#[tokio::test]
async fn test_interrupted_advance_is_recovered_without_remote_call() {
    let dir = TempDir::new().unwrap();
    let optimizer = Arc::new(ScriptedOptimizer::default());
    let pipeline = open(dir.path(), optimizer.clone());

    // State left by a crash between the processed write and the pending delete
    let item = pipeline.submit(answer(2)).await.unwrap();
    let record = ProcessedRecord::new(&item, json!({"done": true}), vec![]);
    pipeline.stores().processed.put(&item.key, &record).unwrap();

    let result = pipeline.reconcile_pending().await.unwrap();

    assert_eq!(result.succeeded, 1);
    assert!(result.outcomes[0].recovered);
    assert_eq!(result.outcomes[0].id, item.id);
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 0);
    assert!(!pipeline.stores().pending.contains(&item.key));
    assert_eq!(
        file_names(&dir.path().join("json_processed")),
        vec![processed_key(&item.key)]
    );
}

#[tokio::test]
async fn test_reused_file_name_is_processed_again() {
    let dir = TempDir::new().unwrap();
    let optimizer = Arc::new(ScriptedOptimizer::default());
    let pipeline = open(dir.path(), optimizer.clone());
    let pending = dir.path().join("json_pending");

    let mut first = answer(1);
    first["day"] = json!(1);
    fs::write(pending.join("load.json"), first.to_string()).unwrap();
    let result = pipeline.reconcile_pending().await.unwrap();
    assert_eq!(result.succeeded, 1);

    // A new request dropped under a name that was already processed
    let mut second = answer(2);
    second["day"] = json!(2);
    fs::write(pending.join("load.json"), second.to_string()).unwrap();
    let result = pipeline.reconcile_pending().await.unwrap();

    assert_eq!((result.total, result.succeeded), (1, 1));
    assert!(!result.outcomes[0].recovered);
    assert_eq!(optimizer.calls.load(Ordering::SeqCst), 2);
    assert!(file_names(&pending).is_empty());

    let record = pipeline.stores().processed.get("load.json").unwrap();
    assert_eq!(record.payload, second);
}

#[tokio::test]
async fn test_submit_and_process_failure_carries_identity() {
    let dir = TempDir::new().unwrap();
    let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));

    let err = pipeline
        .submit_and_process(json!({"fail": 400}))
        .await
        .unwrap_err();

    assert_eq!(err.request_id.len(), 8);
    assert_eq!(err.timestamp.len(), "20250101_120000".len());
    assert!(matches!(
        &err.source,
        PipelineError::Remote(e) if e.status() == Some(400)
    ));

    // The payload is still pending, ready for manual replay
    let pending = pipeline.stores().pending.list().unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].contains(&err.request_id));
    assert!(pending[0].contains(&err.timestamp));
}

#[tokio::test]
async fn test_submit_and_process_writes_workbook_for_multiple_tables() {
    let dir = TempDir::new().unwrap();
    let optimizer = Arc::new(ScriptedOptimizer::default());
    let pipeline = open(dir.path(), optimizer);

    let receipt = pipeline
        .submit_and_process(json!({
            "answer": {
                "filledContainers": [{"name": "40ft"}, {"name": "20ft"}],
                "cargoesLeft": [{"name": "crate"}],
                "status": "partial"
            }
        }))
        .await
        .unwrap();

    assert_eq!(receipt.artifacts[0].extension().unwrap(), "xlsx");
    assert_eq!(receipt.tables.len(), 2);
    assert_eq!(receipt.total_rows, 3);

    let record: Value =
        serde_json::from_str(&fs::read_to_string(&receipt.processed_record).unwrap()).unwrap();
    assert_eq!(record["status"], "processed");
    assert_eq!(record["request_id"], receipt.request_id.as_str());
    assert!(record["processed_at"].is_string());
}

#[tokio::test]
async fn test_bounded_parallelism_keeps_key_order() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.reconcile_concurrency = 4;
    config.export_mode = ExportMode::Delimited;
    let pipeline = Pipeline::new(&config, Arc::new(ScriptedOptimizer::default())).unwrap();

    let pending = dir.path().join("json_pending");
    for i in 0..10 {
        let body = if i % 3 == 0 { json!({"fail": 502}) } else { answer(i) };
        fs::write(pending.join(format!("job_{i:02}.json")), body.to_string()).unwrap();
    }

    let result = pipeline.reconcile_pending().await.unwrap();
    assert_eq!(result.total, 10);
    assert_eq!(result.failed, 4);
    assert_eq!(result.succeeded, 6);

    let files: Vec<&str> = result.outcomes.iter().map(|o| o.file.as_str()).collect();
    let mut sorted = files.clone();
    sorted.sort();
    assert_eq!(files, sorted);
}

#[tokio::test]
async fn test_corrupt_pending_file_is_a_per_item_failure() {
    let dir = TempDir::new().unwrap();
    let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));
    let pending = dir.path().join("json_pending");

    fs::write(pending.join("a.json"), "{truncated").unwrap();
    fs::write(pending.join("b.json"), answer(1).to_string()).unwrap();

    let result = pipeline.reconcile_pending().await.unwrap();
    assert_eq!((result.total, result.succeeded, result.failed), (2, 1, 1));
    assert_eq!(file_names(&pending), vec!["a.json"]);
}

#[tokio::test]
async fn test_unlistable_store_aborts_batch() {
    let dir = TempDir::new().unwrap();
    let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));
    fs::remove_dir_all(dir.path().join("json_pending")).unwrap();

    let err = pipeline.reconcile_pending().await.unwrap_err();
    assert!(matches!(
        err,
        cubeport_pipeline::PersistenceError::Unavailable { .. }
    ));
}

#[tokio::test]
async fn test_empty_backlog() {
    let dir = TempDir::new().unwrap();
    let pipeline = open(dir.path(), Arc::new(ScriptedOptimizer::default()));

    let result = pipeline.reconcile_pending().await.unwrap();
    assert!(result.is_empty());
}

//! Common types used across Cubeport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Lifecycle stage of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Persisted in the pending store, not yet exported
    #[default]
    Pending,
    /// Artifacts written and the processed record is durable
    Processed,
    /// The last attempt failed; the pending record is still intact
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Processed => "processed",
            Stage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work moving through the pipeline.
///
/// Identity is `id`. `key` is the file name of the pending record that holds
/// the item and `export_name` is the base name its artifacts are written
/// under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    /// Compact submission timestamp (`%Y%m%d_%H%M%S`) used in file names
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
    pub stage: Stage,
    pub key: String,
    pub export_name: String,
}

impl WorkItem {
    /// Return a copy of this item at a different stage
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }
}

/// Row count of one exported table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: usize,
}

/// Result of a successful `submit_and_process`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub request_id: String,
    pub timestamp: String,
    pub artifacts: Vec<PathBuf>,
    pub processed_record: PathBuf,
    pub tables: Vec<TableCount>,
    pub total_rows: usize,
}

/// Outcome of one item within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub id: String,
    pub file: String,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableCount>,
    /// The item had already been exported by an interrupted run; only the
    /// pending copy was removed
    #[serde(default)]
    pub recovered: bool,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Processed
    }
}

/// Aggregate result of a backlog run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one item outcome and update the counters
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.total += 1;
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl FromIterator<ItemOutcome> for BatchResult {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        let mut result = BatchResult::new();
        for outcome in iter {
            result.record(outcome);
        }
        result
    }
}

/// Connectivity of the remote optimization service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub remote_reachable: bool,
}

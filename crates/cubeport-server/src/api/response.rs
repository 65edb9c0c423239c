//! API response types

use chrono::{DateTime, Utc};
use cubeport_common::{BatchResult, ItemOutcome, SubmissionReceipt, TableCount};
use serde::Serialize;
use std::path::PathBuf;

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Identity of the persisted pending copy, for manual replay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
            request_id: None,
            timestamp: None,
        }
    }

    /// Create an error response tied to a submitted request
    pub fn for_request(
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: String,
        timestamp: String,
    ) -> Self {
        Self {
            request_id: Some(request_id),
            timestamp: Some(timestamp),
            ..Self::new(code, message)
        }
    }
}

/// Files produced for one request
#[derive(Debug, Serialize)]
pub struct ResultFiles {
    pub processed_record: PathBuf,
    pub artifacts: Vec<PathBuf>,
}

/// Successful `POST /optimize-load`
#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub status: &'static str,
    pub request_id: String,
    pub timestamp: String,
    pub files: ResultFiles,
    pub tables: Vec<TableCount>,
    pub total_rows: usize,
    pub processed_at: DateTime<Utc>,
}

impl From<SubmissionReceipt> for OptimizeResponse {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            status: "success",
            request_id: receipt.request_id,
            timestamp: receipt.timestamp,
            files: ResultFiles {
                processed_record: receipt.processed_record,
                artifacts: receipt.artifacts,
            },
            tables: receipt.tables,
            total_rows: receipt.total_rows,
            processed_at: Utc::now(),
        }
    }
}

/// Result of a backlog run
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub status: &'static str,
    pub message: String,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub details: Vec<ItemOutcome>,
    pub processed_at: DateTime<Utc>,
}

impl From<BatchResult> for ReconcileResponse {
    fn from(result: BatchResult) -> Self {
        let (status, message) = if result.is_empty() {
            ("no_files", "No pending files to process".to_string())
        } else {
            (
                "completed",
                format!(
                    "Processing finished: {} file(s) processed, {} failure(s)",
                    result.succeeded, result.failed
                ),
            )
        };

        Self {
            status,
            message,
            total: result.total,
            processed: result.succeeded,
            failed: result.failed,
            details: result.outcomes,
            processed_at: Utc::now(),
        }
    }
}

/// `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cubemaster_api: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(remote_reachable: bool) -> Self {
        Self {
            status: if remote_reachable { "healthy" } else { "degraded" },
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            cubemaster_api: if remote_reachable { "connected" } else { "disconnected" },
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response_omits_missing_identity() {
        let body = serde_json::to_value(ErrorResponse::new("bad_request", "nope")).unwrap();
        assert_eq!(body, json!({"error": "bad_request", "message": "nope"}));

        let body = serde_json::to_value(ErrorResponse::for_request(
            "upstream_failure",
            "down",
            "ab12cd34".to_string(),
            "20250101_120000".to_string(),
        ))
        .unwrap();
        assert_eq!(body["request_id"], "ab12cd34");
        assert_eq!(body["timestamp"], "20250101_120000");
    }

    #[test]
    fn test_empty_batch_reports_no_files() {
        let response = ReconcileResponse::from(BatchResult::new());
        assert_eq!(response.status, "no_files");
        assert_eq!(response.total, 0);
    }

    #[test]
    fn test_health_response() {
        let response = HealthResponse::new(false);
        assert_eq!(response.status, "degraded");
        assert_eq!(response.cubemaster_api, "disconnected");
    }
}

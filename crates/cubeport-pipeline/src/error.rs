//! Error types for the Cubeport pipeline
//!
//! One enum per component boundary. [`PipelineError`] wraps them for callers
//! that drive a whole item, and [`SubmissionError`] adds the identity and
//! timestamp an operator needs to find the persisted pending copy.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Failure talking to the remote optimization service
#[derive(Error, Debug)]
pub enum RemoteCallError {
    /// The service answered with a non-success status
    #[error("Optimization API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Could not reach the optimization API: {0}")]
    Transport(String),

    #[error("Optimization API returned an unreadable body: {0}")]
    InvalidBody(String),
}

impl RemoteCallError {
    /// HTTP status reported by the service, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteCallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The service rejected the request itself (status below 500)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(status) if status < 500)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteCallError::Timeout { .. })
    }

    /// Human-readable message without the status prefix
    pub fn message(&self) -> String {
        match self {
            RemoteCallError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure reading or writing one of the stores
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode record {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {} is not usable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The store itself cannot be listed or created
    #[error("Store at {} is unavailable: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// The result cannot be laid out as tables
#[derive(Error, Debug)]
pub enum FlatteningError {
    #[error("Table '{table}' would have {count} columns, more than the limit of {limit}")]
    TooManyColumns {
        table: String,
        count: usize,
        limit: usize,
    },
}

/// Failure rendering tables to an artifact
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: no tables were given")]
    EmptyArtifact,

    #[error("Table '{table}' has no columns")]
    EmptyTable { table: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Delimited output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook output failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Any failure while driving one work item
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Flattening(#[from] FlatteningError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// Short machine-readable kind, used in error records and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Remote(_) => "remote_call",
            PipelineError::Persistence(_) => "persistence",
            PipelineError::Flattening(_) => "flattening",
            PipelineError::Export(ExportError::EmptyArtifact) => "empty_artifact",
            PipelineError::Export(ExportError::EmptyTable { .. }) => "empty_table",
            PipelineError::Export(_) => "export",
        }
    }
}

/// Failure of `submit_and_process`, tagged with the item it belongs to
#[derive(Error, Debug)]
#[error("Request {request_id} ({timestamp}) failed: {source}")]
pub struct SubmissionError {
    pub request_id: String,
    pub timestamp: String,
    #[source]
    pub source: PipelineError,
}

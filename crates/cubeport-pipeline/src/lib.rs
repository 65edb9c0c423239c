//! Cubeport Pipeline Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns load-optimization results into spreadsheet artifacts without losing
//! a request along the way.
//!
//! # Components
//!
//! - **[`flatten`]**: arbitrary JSON into named flat tables
//! - **[`export`]**: tables into a CSV file or a multi-sheet workbook
//! - **[`store`]**: durable pending, processed and error stores
//! - **[`pipeline`]**: the pending → processed state machine
//! - **[`reconcile`]**: batch processing of the pending backlog
//! - **[`remote`]**: the optimization service client
//!
//! # Example
//!
//! ```no_run
//! use cubeport_pipeline::{Pipeline, PipelineConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let receipt = pipeline.submit_and_process(json!({"cargoes": []})).await?;
//!     println!("exported {:?}", receipt.artifacts);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod flatten;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod store;

pub use config::PipelineConfig;
pub use error::{
    ExportError, FlatteningError, PersistenceError, PipelineError, RemoteCallError, SubmissionError,
};
pub use export::{ArtifactFormat, ExportArtifact, ExportMode};
pub use flatten::{flatten, Cell, FlatTable};
pub use pipeline::{Advanced, Pipeline};
pub use remote::{CubeMasterClient, Optimizer};

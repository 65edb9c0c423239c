//! Cubeport Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Cubeport workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CubeportError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: work-item lifecycle and batch reporting types shared by the
//!   pipeline and the HTTP surface
//!
//! # Example
//!
//! ```no_run
//! use cubeport_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CubeportError, Result};
pub use types::{BatchResult, HealthStatus, ItemOutcome, Stage, SubmissionReceipt, TableCount, WorkItem};

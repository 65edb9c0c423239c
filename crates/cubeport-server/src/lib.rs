//! Cubeport Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! HTTP surface over the Cubeport pipeline.
//!
//! # Endpoints
//!
//! - `GET /`: service information
//! - `GET /health`: connectivity to the optimization service
//! - `POST /optimize-load`: persist, optimize and export one load request
//! - `GET|POST /process-pending-files`: reconcile the pending backlog
//!
//! Failed requests answer with `{error, message, request_id, timestamp}` so
//! the pending copy can be found and replayed.
//!
//! # Example
//!
//! ```no_run
//! use cubeport_pipeline::Pipeline;
//! use cubeport_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pipeline = Pipeline::from_config(&config.pipeline)?;
//!     let app = api::create_router(api::AppState::new(pipeline), &config.cors);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};

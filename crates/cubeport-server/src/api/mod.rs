pub mod response;

use crate::config::CorsConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use cubeport_pipeline::Pipeline;
use response::{HealthResponse, OptimizeResponse, ReconcileResponse};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/optimize-load", axum::routing::post(optimize_load))
        .route(
            "/process-pending-files",
            get(process_pending_files).post(process_pending_files),
        )
        .with_state(state)
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Cubeport",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": chrono::Utc::now(),
        "endpoints": {
            "health": "/health",
            "optimize_load": "/optimize-load",
            "process_pending_files": "/process-pending-files"
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.pipeline.health_check().await;
    Json(HealthResponse::new(status.remote_reachable))
}

/// Persist, optimize and export one load request
async fn optimize_load(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<OptimizeResponse>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let receipt = state.pipeline.submit_and_process(payload).await?;
    Ok(Json(receipt.into()))
}

/// Drive every pending file through the pipeline
async fn process_pending_files(State(state): State<AppState>) -> ApiResult<Json<ReconcileResponse>> {
    let result = state.pipeline.reconcile_pending().await?;
    Ok(Json(result.into()))
}

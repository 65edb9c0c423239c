//! Cubeport HTTP server

use anyhow::{Context, Result};
use cubeport_common::logging::{init_logging, LogConfig};
use cubeport_pipeline::Pipeline;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use cubeport_server::{
    api::{create_router, AppState},
    config::Config,
};

const DEFAULT_LOG_FILTER: &str = "cubeport_server=debug,cubeport_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let defaults = LogConfig::builder()
        .log_file_prefix("cubeport-server")
        .filter_directives(DEFAULT_LOG_FILTER)
        .build();
    // LOG_* variables win over the defaults above
    let log_config = LogConfig::from_env_or(defaults.clone()).unwrap_or(defaults);
    let _guard = init_logging(&log_config)?;

    let config = Config::load().context("Invalid configuration")?;
    info!(
        api_url = %config.pipeline.api_url,
        data_dir = %config.pipeline.data_dir.display(),
        export_mode = %config.pipeline.export_mode,
        "Configuration loaded"
    );

    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let app = create_router(AppState::new(pipeline), &config.cors);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Cubeport server listening");

    // Requests still running this long after the signal are abandoned
    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    let (signalled, on_signal) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            let _ = signalled.send(());
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            if on_signal.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => warn!(grace_secs = grace.as_secs(), "Requests still running after shutdown grace period"),
    }

    info!("Cubeport server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM. axum then stops accepting
/// connections and lets in-flight requests finish their advance.
async fn wait_for_shutdown() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Interrupt received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

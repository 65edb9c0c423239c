//! Cubeport - load-optimization export pipeline

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cubeport_common::logging::{init_logging, LogConfig, LogLevel};
use cubeport_pipeline::{pipeline::export_result, ExportMode, Pipeline, PipelineConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cubeport")]
#[command(author, version, about = "Load-optimization export pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root directory of the pending, processed, export and error stores
    #[arg(long, global = true, env = "RESPONSE_OUTPUT_DIR")]
    data_dir: Option<PathBuf>,

    /// Artifact format: auto, delimited or workbook
    #[arg(long, global = true, env = "EXPORT_MODE")]
    export_mode: Option<ExportMode>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every pending request
    Reconcile,

    /// Submit a payload file and export its result
    Submit {
        /// JSON payload to send to the optimization service
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check connectivity to the optimization service
    Health,

    /// Flatten and export a saved optimization result, offline
    Flatten {
        /// Saved JSON result
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the artifact to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("cubeport")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env_or(log_config.clone()).unwrap_or(log_config);
    let _guard = init_logging(&log_config)?;

    let overrides = Overrides {
        data_dir: cli.data_dir,
        export_mode: cli.export_mode,
    };

    match cli.command {
        Command::Flatten { input, output } => {
            let result = read_json(&input)?;
            let base_name = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "result".to_string());

            let artifact = export_result(
                &result,
                &output,
                &base_name,
                overrides.export_mode.unwrap_or_default(),
            )?;
            print_json(&artifact)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Reconcile => {
            let pipeline = overrides.open()?;
            let result = pipeline.reconcile_pending().await?;
            info!(
                total = result.total,
                succeeded = result.succeeded,
                failed = result.failed,
                "Reconcile complete"
            );
            print_json(&result)?;
            Ok(exit_code(result.failed == 0))
        }
        Command::Submit { file } => {
            let payload = read_json(&file)?;
            let pipeline = overrides.open()?;
            let receipt = pipeline.submit_and_process(payload).await?;
            print_json(&receipt)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let health = overrides.open()?.health_check().await;
            print_json(&health)?;
            Ok(exit_code(health.remote_reachable))
        }
    }
}

/// Command-line settings layered over the environment configuration
struct Overrides {
    data_dir: Option<PathBuf>,
    export_mode: Option<ExportMode>,
}

impl Overrides {
    fn open(self) -> Result<Pipeline> {
        let mut config = PipelineConfig::from_env()?;
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(mode) = self.export_mode {
            config.export_mode = mode;
        }
        Ok(Pipeline::from_config(&config)?)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Pipeline configuration
//!
//! Built once at startup and handed to [`Pipeline::new`](crate::Pipeline::new).

use crate::export::ExportMode;
use cubeport_common::{CubeportError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default root directory for all stores.
pub const DEFAULT_DATA_DIR: &str = "response_data";

/// Default timeout for optimization calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for connectivity checks, in seconds.
pub const DEFAULT_CONNECT_CHECK_TIMEOUT_SECS: u64 = 10;

/// Default number of backlog items processed at once.
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 1;

pub const PENDING_DIR: &str = "json_pending";
pub const PROCESSED_DIR: &str = "json_processed";
pub const EXPORTS_DIR: &str = "exports";
pub const ERRORS_DIR: &str = "errors";

/// Settings for the remote client, the stores and the reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub token_id: String,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub connect_check_timeout_secs: u64,
    pub export_mode: ExportMode,
    pub reconcile_concurrency: usize,
}

impl PipelineConfig {
    /// Configuration with defaults for everything but the remote endpoint
    pub fn new(api_url: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token_id: token_id.into(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_check_timeout_secs: DEFAULT_CONNECT_CHECK_TIMEOUT_SECS,
            export_mode: ExportMode::default(),
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
        }
    }

    /// Load from the process environment, after reading `.env` if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(CubeportError::MissingSetting(name))
        };

        let mut config = Self::new(
            required("CUBEMASTER_API_URL")?,
            required("CUBEMASTER_TOKEN_ID")?,
        );

        if let Some(dir) = lookup("RESPONSE_OUTPUT_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("CUBEMASTER_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_setting("CUBEMASTER_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("CUBEMASTER_HEALTH_TIMEOUT_SECS") {
            config.connect_check_timeout_secs =
                parse_setting("CUBEMASTER_HEALTH_TIMEOUT_SECS", &secs)?;
        }
        if let Some(mode) = lookup("EXPORT_MODE") {
            config.export_mode = mode.parse()?;
        }
        if let Some(n) = lookup("RECONCILE_CONCURRENCY") {
            config.reconcile_concurrency = parse_setting("RECONCILE_CONCURRENCY", &n)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(CubeportError::MissingSetting("CUBEMASTER_API_URL"));
        }
        if self.token_id.trim().is_empty() {
            return Err(CubeportError::MissingSetting("CUBEMASTER_TOKEN_ID"));
        }
        if self.request_timeout_secs == 0 {
            return Err(CubeportError::config("request timeout must be greater than 0"));
        }
        if self.connect_check_timeout_secs == 0 {
            return Err(CubeportError::config(
                "connectivity check timeout must be greater than 0",
            ));
        }
        if self.reconcile_concurrency == 0 {
            return Err(CubeportError::config(
                "reconcile concurrency must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.data_dir.join(PENDING_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join(PROCESSED_DIR)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join(EXPORTS_DIR)
    }

    pub fn errors_dir(&self) -> PathBuf {
        self.data_dir.join(ERRORS_DIR)
    }

    /// Return a copy rooted at `dir`
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }
}

fn parse_setting<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CubeportError::invalid_setting(name, value))
}

//! Client for the remote load-optimization service
//!
//! The pipeline only depends on the [`Optimizer`] trait. [`CubeMasterClient`]
//! is the HTTP implementation used in production.

use crate::config::PipelineConfig;
use crate::error::RemoteCallError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the API token
pub const TOKEN_HEADER: &str = "TokenID";

/// Path segment stripped from the API URL to find the service root
const LOADS_SEGMENT: &str = "/loads";

/// A service that turns a load request into an optimization result
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Submit `payload` and return the service's JSON answer
    async fn optimize(&self, payload: &Value) -> Result<Value, RemoteCallError>;

    /// Whether the service can currently be reached
    async fn ping(&self) -> bool;
}

/// HTTP client for the CubeMaster API
#[derive(Debug, Clone)]
pub struct CubeMasterClient {
    client: Client,
    api_url: String,
    token_id: String,
    request_timeout: Duration,
    ping_timeout: Duration,
}

impl CubeMasterClient {
    /// Create a new client
    pub fn new(config: &PipelineConfig) -> Result<Self, RemoteCallError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteCallError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token_id: config.token_id.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            ping_timeout: Duration::from_secs(config.connect_check_timeout_secs),
        })
    }

    /// Root URL probed by [`Optimizer::ping`]
    pub fn base_url(&self) -> &str {
        let url = self.api_url.trim_end_matches('/');
        url.strip_suffix(LOADS_SEGMENT).unwrap_or(url)
    }

    fn map_send_error(&self, operation: &'static str, timeout: Duration, e: reqwest::Error) -> RemoteCallError {
        if e.is_timeout() {
            RemoteCallError::Timeout {
                operation,
                secs: timeout.as_secs(),
            }
        } else {
            RemoteCallError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl Optimizer for CubeMasterClient {
    async fn optimize(&self, payload: &Value) -> Result<Value, RemoteCallError> {
        debug!(url = %self.api_url, "Sending optimization request");

        let response = self
            .client
            .post(&self.api_url)
            .header(TOKEN_HEADER, &self.token_id)
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_send_error("Optimization request", self.request_timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), %message, "Optimization API rejected request");
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                RemoteCallError::Timeout {
                    operation: "Optimization request",
                    secs: self.request_timeout.as_secs(),
                }
            } else {
                RemoteCallError::InvalidBody(e.to_string())
            }
        })
    }

    async fn ping(&self) -> bool {
        match self
            .client
            .get(self.base_url())
            .header(TOKEN_HEADER, &self.token_id)
            .timeout(self.ping_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                debug!(error = %e, "Optimization API unreachable");
                false
            }
        }
    }
}

/// Human-readable message from an error body: its `message` field when the
/// body is a JSON object carrying one, otherwise the raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

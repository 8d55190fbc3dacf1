//! HTTP client for the agent API worker listing.
//!
//! Calls `POST {api_server}/workers.get_all` and reads `data.workers[].id`.
//! Uses the blocking reqwest client because registration itself is blocking;
//! do not construct it from inside an async runtime.

use super::{WorkerInfo, WorkerRegistry};
use crate::config::RegistryConfig;
use crate::{Result, SlotError};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct WorkersResponse {
    data: WorkersData,
}

#[derive(Debug, Deserialize)]
struct WorkersData {
    #[serde(default)]
    workers: Vec<WorkerInfo>,
}

/// Worker registry backed by the agent API server.
pub struct ApiWorkerRegistry {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl ApiWorkerRegistry {
    /// Create a client for the given API server base URL.
    pub fn new(api_server: &str) -> Result<Self> {
        Self::with_timeout(api_server, RegistryConfig::REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(api_server: &str, timeout: Duration) -> Result<Self> {
        let base = api_server.trim_end_matches('/');
        if base.is_empty() {
            return Err(SlotError::Config {
                message: "worker registry API server URL is empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(RegistryConfig::USER_AGENT)
            .build()
            .map_err(|e| SlotError::Registry {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", base, RegistryConfig::WORKERS_ENDPOINT),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl WorkerRegistry for ApiWorkerRegistry {
    fn list_workers(&self) -> Result<Vec<WorkerInfo>> {
        let mut request = self.client.post(&self.endpoint).json(&serde_json::json!({}));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| SlotError::Registry {
            message: format!("POST {} failed: {}", self.endpoint, e),
            status_code: e.status().map(|s| s.as_u16()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlotError::Registry {
                message: format!("POST {} returned {}", self.endpoint, status),
                status_code: Some(status.as_u16()),
            });
        }

        let body = response.text()?;
        let workers = parse_workers_response(&body)?;
        debug!("Worker registry lists {} workers", workers.len());
        Ok(workers)
    }
}

/// Parse a `workers.get_all` response body.
pub(crate) fn parse_workers_response(body: &str) -> Result<Vec<WorkerInfo>> {
    let parsed: WorkersResponse = serde_json::from_str(body).map_err(|e| SlotError::Json {
        message: format!("Invalid workers.get_all response: {}", e),
        source: Some(e),
    })?;
    Ok(parsed.data.workers)
}

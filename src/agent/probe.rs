//! Connectivity probes for the remote compute backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::AgentError;

#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// Check that the backend is reachable and healthy
    async fn ping(&self) -> Result<(), AgentError>;
}

/// Probe that always succeeds, for nodes without a configured backend
#[derive(Debug, Clone, Default)]
pub struct NoopProbe;

#[async_trait]
impl BackendProbe for NoopProbe {
    async fn ping(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Probe that issues `GET {base_url}/health` against the backend
#[derive(Clone)]
pub struct HttpBackendProbe {
    client: Client,
    health_url: String,
}

impl HttpBackendProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Client(e.to_string()))?;

        Ok(Self {
            client,
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
        })
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }
}

#[async_trait]
impl BackendProbe for HttpBackendProbe {
    async fn ping(&self) -> Result<(), AgentError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| AgentError::Connectivity(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Connectivity(format!(
                "{} returned status {}",
                self.health_url,
                response.status()
            )));
        }

        Ok(())
    }
}

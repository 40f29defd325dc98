//! Gateway events pushed after state changes
//!
//! Events are fire-and-forget: the gateway spawns the push on a detached task
//! and never waits for it or reports its failure to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Emitted after a stub has been deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStubEvent {
    pub workspace_id: String,
    pub stub_id: String,
    pub stub_type: String,
    pub deployment_name: String,
    pub version: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to push event: {0}")]
    PushFailed(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn push_deploy_stub_event(&self, event: DeployStubEvent) -> Result<(), EventError>;
}

/// Sink that records events in the structured log
#[derive(Debug, Clone, Default)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn push_deploy_stub_event(&self, event: DeployStubEvent) -> Result<(), EventError> {
        info!(
            workspace = %event.workspace_id,
            stub = %event.stub_id,
            stub_type = %event.stub_type,
            deployment = %event.deployment_name,
            version = event.version,
            "stub deployed"
        );
        Ok(())
    }
}

//! Deployment resource - a named, versioned activation of a stub

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stub::StubType;

/// A deployment of a stub under a name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: u64,
    pub external_id: String,
    pub name: String,
    pub stub_id: u64,
    pub stub_type: StubType,
    pub workspace_id: u64,

    /// Starts at 1 and increases by one per deploy of the same key
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn key(&self) -> DeploymentKey {
        DeploymentKey::new(self.workspace_id, &self.name, self.stub_type.clone())
    }
}

/// Versioning scope of deployments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub workspace_id: u64,
    pub name: String,
    pub stub_type: StubType,
}

impl DeploymentKey {
    pub fn new(workspace_id: u64, name: impl Into<String>, stub_type: StubType) -> Self {
        Self {
            workspace_id,
            name: name.into(),
            stub_type,
        }
    }
}

//! Deployment versioning
//!
//! Each (workspace, name, stub type) has its own version sequence starting at
//! 1. Reading the latest version and writing the next one happen under a
//! per-key async lock, so concurrent deploys of the same key get distinct,
//! gapless versions. Deploys of different keys never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::repository::{BackendRepository, RepositoryError};
use crate::types::{Deployment, DeploymentKey, StubType};

#[derive(Clone)]
pub struct DeploymentVersioner {
    repo: Arc<dyn BackendRepository>,
    locks: Arc<DashMap<DeploymentKey, Arc<Mutex<()>>>>,
}

impl DeploymentVersioner {
    pub fn new(repo: Arc<dyn BackendRepository>) -> Self {
        Self {
            repo,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Record the next version of deployment `name` for the given stub
    pub async fn create_deployment(
        &self,
        workspace_id: u64,
        name: &str,
        stub_type: &StubType,
        stub_id: u64,
    ) -> Result<Deployment, RepositoryError> {
        let key = DeploymentKey::new(workspace_id, name, stub_type.clone());
        let lock = self.locks.entry(key).or_default().clone();
        let _guard = lock.lock().await;

        let version = self
            .repo
            .get_latest_deployment_by_name(workspace_id, name, stub_type)
            .await?
            .map(|latest| latest.version + 1)
            .unwrap_or(1);

        let deployment = self
            .repo
            .create_deployment(workspace_id, name, version, stub_id, stub_type)
            .await?;

        info!(
            "Deployment {} created: name={}, type={}, version={}",
            deployment.external_id, deployment.name, deployment.stub_type, deployment.version
        );
        Ok(deployment)
    }
}

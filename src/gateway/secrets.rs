//! Secret resolution for stub registration
//!
//! Secrets are looked up by name inside the caller's workspace. A secret that
//! does not exist is dropped from the result; any other lookup failure aborts
//! the whole batch.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::repository::{BackendRepository, RepositoryError};
use crate::types::{Secret, SecretRequest, Workspace};

#[derive(Clone)]
pub struct SecretResolver {
    repo: Arc<dyn BackendRepository>,
}

impl SecretResolver {
    pub fn new(repo: Arc<dyn BackendRepository>) -> Self {
        Self { repo }
    }

    /// Resolve the requested secrets, in request order, skipping missing ones
    pub async fn resolve(
        &self,
        workspace: &Workspace,
        requested: &[SecretRequest],
    ) -> Result<Vec<Secret>, RepositoryError> {
        let lookups = requested.iter().map(|req| async move {
            match self.repo.get_secret_by_name(workspace, &req.name).await {
                Ok(secret) => Ok(Some(secret)),
                Err(RepositoryError::NotFound(_)) => {
                    debug!(
                        "Skipping missing secret '{}' in workspace {}",
                        req.name, workspace.name
                    );
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        });

        let resolved = try_join_all(lookups).await?;
        Ok(resolved.into_iter().flatten().collect())
    }
}

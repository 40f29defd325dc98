//! Backend repository - the persistence seam of the gateway
//!
//! The gateway never talks to a database directly. It goes through the
//! [`BackendRepository`] trait so the storage engine can be swapped out and
//! mocked in tests. [`InMemoryBackendRepository`] is the reference
//! implementation used by the `serve` command and the test suite.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Deployment, Object, Secret, Stub, StubConfig, StubType, Workspace};

mod memory;

pub use memory::InMemoryBackendRepository;

/// Errors surfaced by a repository implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}

#[async_trait]
pub trait BackendRepository: Send + Sync {
    /// Resolve a bearer token to the workspace it authenticates
    async fn authorize(&self, token: &str) -> Result<Workspace, RepositoryError>;

    async fn get_secret_by_name(
        &self,
        workspace: &Workspace,
        name: &str,
    ) -> Result<Secret, RepositoryError>;

    /// Look up an object by external id, scoped to its owning workspace
    async fn get_object_by_external_id(
        &self,
        external_id: &str,
        workspace_id: u64,
    ) -> Result<Object, RepositoryError>;

    /// Return the stub for (name, type, workspace), inserting it if absent.
    ///
    /// With `force_create` a new stub is always inserted. An existing stub is
    /// returned as stored; `config` is not merged into it.
    async fn get_or_create_stub(
        &self,
        name: &str,
        stub_type: &StubType,
        config: StubConfig,
        object_id: u64,
        workspace_id: u64,
        force_create: bool,
    ) -> Result<Stub, RepositoryError>;

    async fn get_stub_by_external_id(&self, external_id: &str) -> Result<Stub, RepositoryError>;

    /// Latest deployment for (workspace, name, type), or `None` if never deployed
    async fn get_latest_deployment_by_name(
        &self,
        workspace_id: u64,
        name: &str,
        stub_type: &StubType,
    ) -> Result<Option<Deployment>, RepositoryError>;

    /// Persist a deployment. Fails with `Conflict` if the version is taken.
    async fn create_deployment(
        &self,
        workspace_id: u64,
        name: &str,
        version: u32,
        stub_id: u64,
        stub_type: &StubType,
    ) -> Result<Deployment, RepositoryError>;
}

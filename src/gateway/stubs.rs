//! Stub registry - idempotent get-or-create of stub definitions

use std::sync::Arc;

use tracing::{debug, info};

use crate::repository::{BackendRepository, RepositoryError};
use crate::types::{Stub, StubConfig, StubKey, StubType};

#[derive(Clone)]
pub struct StubRegistry {
    repo: Arc<dyn BackendRepository>,
}

impl StubRegistry {
    pub fn new(repo: Arc<dyn BackendRepository>) -> Self {
        Self { repo }
    }

    /// Return the stub registered under (name, type, workspace), creating it
    /// from `config` if none exists.
    ///
    /// An existing stub is returned as-is: the new config is not applied to it.
    /// `force_create` always mints a new stub identity.
    pub async fn get_or_create(
        &self,
        name: &str,
        stub_type: &StubType,
        config: StubConfig,
        object_id: u64,
        workspace_id: u64,
        force_create: bool,
    ) -> Result<Stub, RepositoryError> {
        let key = StubKey::new(workspace_id, name, stub_type.clone());
        debug!(
            "Resolving stub {}/{} ({}), force_create={}",
            workspace_id,
            name,
            key.fingerprint(),
            force_create
        );

        let stub = self
            .repo
            .get_or_create_stub(name, stub_type, config, object_id, workspace_id, force_create)
            .await?;

        info!(
            "Stub {} ready: name={}, type={}, workspace={}",
            stub.external_id, stub.name, stub.stub_type, stub.workspace_id
        );
        Ok(stub)
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{BackendRepository, RepositoryError};
use crate::types::{
    Deployment, DeploymentKey, Object, Secret, Stub, StubConfig, StubKey, StubType, Workspace,
};

/// Repository backed by concurrent in-process maps
#[derive(Default)]
pub struct InMemoryBackendRepository {
    next_id: AtomicU64,

    /// Workspaces indexed by bearer token
    tokens: DashMap<String, Workspace>,

    /// Secrets indexed by (workspace id, name)
    secrets: DashMap<(u64, String), Secret>,

    /// Objects indexed by (workspace id, external id)
    objects: DashMap<(u64, String), Object>,

    /// Stubs indexed by internal id
    stubs: DashMap<u64, Stub>,

    /// Stub key -> id of the current stub for that key
    stub_index: DashMap<StubKey, u64>,

    /// Stub external id -> internal id
    stub_external_ids: DashMap<String, u64>,

    /// Deployment history per key, ordered by version
    deployments: DashMap<DeploymentKey, Vec<Deployment>>,
}

impl InMemoryBackendRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Create a workspace reachable with the given bearer token
    pub fn add_workspace(&self, name: impl Into<String>, token: impl Into<String>) -> Workspace {
        let workspace = Workspace {
            id: self.allocate_id(),
            external_id: Uuid::new_v4().to_string(),
            name: name.into(),
        };
        self.tokens.insert(token.into(), workspace.clone());
        workspace
    }

    /// Store or replace a secret in a workspace
    pub fn put_secret(&self, workspace_id: u64, name: impl Into<String>, value: impl Into<String>) {
        let secret = Secret::new(name, value);
        self.secrets
            .insert((workspace_id, secret.name.clone()), secret);
    }

    /// Register an uploaded code object under a fresh external id
    pub fn add_object(&self, workspace_id: u64, hash: impl Into<String>, size: u64) -> Object {
        self.register_object(workspace_id, Uuid::new_v4().to_string(), hash, size)
    }

    /// Register a code object whose external id is already known
    pub fn register_object(
        &self,
        workspace_id: u64,
        external_id: impl Into<String>,
        hash: impl Into<String>,
        size: u64,
    ) -> Object {
        let object = Object {
            id: self.allocate_id(),
            external_id: external_id.into(),
            workspace_id,
            hash: hash.into(),
            size,
        };
        self.objects.insert(
            (workspace_id, object.external_id.clone()),
            object.clone(),
        );
        object
    }

    pub fn stub_count(&self) -> usize {
        self.stubs.len()
    }

    fn insert_stub(
        &self,
        name: &str,
        stub_type: &StubType,
        config: StubConfig,
        object_id: u64,
        workspace_id: u64,
    ) -> Stub {
        let stub = Stub {
            id: self.allocate_id(),
            external_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            stub_type: stub_type.clone(),
            workspace_id,
            object_id,
            config,
            created_at: Utc::now(),
        };
        self.stub_external_ids
            .insert(stub.external_id.clone(), stub.id);
        self.stubs.insert(stub.id, stub.clone());
        stub
    }
}

#[async_trait]
impl BackendRepository for InMemoryBackendRepository {
    async fn authorize(&self, token: &str) -> Result<Workspace, RepositoryError> {
        self.tokens
            .get(token)
            .map(|w| w.clone())
            .ok_or_else(|| RepositoryError::NotFound("token".to_string()))
    }

    async fn get_secret_by_name(
        &self,
        workspace: &Workspace,
        name: &str,
    ) -> Result<Secret, RepositoryError> {
        self.secrets
            .get(&(workspace.id, name.to_string()))
            .map(|s| s.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("secret '{}'", name)))
    }

    async fn get_object_by_external_id(
        &self,
        external_id: &str,
        workspace_id: u64,
    ) -> Result<Object, RepositoryError> {
        self.objects
            .get(&(workspace_id, external_id.to_string()))
            .map(|o| o.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("object '{}'", external_id)))
    }

    async fn get_or_create_stub(
        &self,
        name: &str,
        stub_type: &StubType,
        config: StubConfig,
        object_id: u64,
        workspace_id: u64,
        force_create: bool,
    ) -> Result<Stub, RepositoryError> {
        let key = StubKey::new(workspace_id, name, stub_type.clone());

        if force_create {
            let stub = self.insert_stub(name, stub_type, config, object_id, workspace_id);
            self.stub_index.insert(key, stub.id);
            return Ok(stub);
        }

        // The entry guard serializes concurrent creates for the same key
        match self.stub_index.entry(key) {
            Entry::Occupied(entry) => self
                .stubs
                .get(entry.get())
                .map(|s| s.clone())
                .ok_or_else(|| RepositoryError::Backend("dangling stub index".to_string())),
            Entry::Vacant(entry) => {
                let stub = self.insert_stub(name, stub_type, config, object_id, workspace_id);
                entry.insert(stub.id);
                Ok(stub)
            }
        }
    }

    async fn get_stub_by_external_id(&self, external_id: &str) -> Result<Stub, RepositoryError> {
        self.stub_external_ids
            .get(external_id)
            .and_then(|id| self.stubs.get(id.value()).map(|s| s.clone()))
            .ok_or_else(|| RepositoryError::NotFound(format!("stub '{}'", external_id)))
    }

    async fn get_latest_deployment_by_name(
        &self,
        workspace_id: u64,
        name: &str,
        stub_type: &StubType,
    ) -> Result<Option<Deployment>, RepositoryError> {
        let key = DeploymentKey::new(workspace_id, name, stub_type.clone());
        Ok(self
            .deployments
            .get(&key)
            .and_then(|history| history.iter().max_by_key(|d| d.version).cloned()))
    }

    async fn create_deployment(
        &self,
        workspace_id: u64,
        name: &str,
        version: u32,
        stub_id: u64,
        stub_type: &StubType,
    ) -> Result<Deployment, RepositoryError> {
        let key = DeploymentKey::new(workspace_id, name, stub_type.clone());
        let mut history = self.deployments.entry(key).or_default();

        if history.iter().any(|d| d.version == version) {
            return Err(RepositoryError::Conflict(format!(
                "deployment '{}' version {} already exists",
                name, version
            )));
        }

        let deployment = Deployment {
            id: self.allocate_id(),
            external_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            stub_id,
            stub_type: stub_type.clone(),
            workspace_id,
            version,
            created_at: Utc::now(),
        };
        history.push(deployment.clone());
        Ok(deployment)
    }
}

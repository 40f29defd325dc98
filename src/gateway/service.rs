//! Gateway service - the request-level entry points for stub registration
//! and deployment.
//!
//! Both operations keep the boolean `ok` contract of the wire API: any
//! internal failure yields `ok: false`. In addition, responses carry an
//! [`ErrorKind`] so callers can tell a missing record from an authorization
//! mismatch or an upstream outage.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::autoscaler::{resolve_autoscaler, AutoscalerRequest};
use super::deployments::DeploymentVersioner;
use super::secrets::SecretResolver;
use super::stubs::StubRegistry;
use crate::events::{DeployStubEvent, EventSink};
use crate::objects::{ObjectError, ObjectMaterializer};
use crate::repository::{BackendRepository, RepositoryError};
use crate::types::{
    AuthInfo, Deployment, GpuType, Runtime, SecretRequest, Stub, StubConfig, StubType,
    TaskPolicy, Volume,
};

/// Coarse classification of a gateway failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AuthorizationMismatch,
    UpstreamFailure,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} belongs to a different workspace")]
    Unauthorized(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Unauthorized(_) => ErrorKind::AuthorizationMismatch,
            GatewayError::Upstream(_) => ErrorKind::UpstreamFailure,
        }
    }
}

impl From<RepositoryError> for GatewayError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(what) => GatewayError::NotFound(what),
            other => GatewayError::Upstream(other.to_string()),
        }
    }
}

impl From<ObjectError> for GatewayError {
    fn from(e: ObjectError) -> Self {
        GatewayError::Upstream(format!("object materialization failed: {}", e))
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetOrCreateStubRequest {
    pub name: String,
    pub stub_type: String,
    pub cpu: i64,
    pub gpu: String,
    pub memory: i64,
    pub image_id: String,
    pub handler: String,
    pub on_start: String,
    pub callback_url: String,
    pub python_version: String,
    pub secrets: Vec<SecretRequest>,
    pub retries: u32,
    pub timeout: i64,
    pub keep_warm_seconds: u32,
    pub workers: u32,
    pub max_pending_tasks: u32,
    pub volumes: Vec<Volume>,
    pub authorized: bool,
    pub autoscaler: AutoscalerRequest,
    pub object_id: String,
    pub force_create: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreateStubResponse {
    pub ok: bool,
    #[serde(default)]
    pub stub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStubRequest {
    pub stub_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStubResponse {
    pub ok: bool,
    #[serde(default)]
    pub deployment_id: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl GetOrCreateStubResponse {
    fn from_result(result: Result<Stub, GatewayError>) -> Self {
        match result {
            Ok(stub) => Self {
                ok: true,
                stub_id: stub.external_id,
                error_kind: None,
            },
            Err(e) => Self {
                ok: false,
                stub_id: String::new(),
                error_kind: Some(e.kind()),
            },
        }
    }
}

impl DeployStubResponse {
    fn from_result(result: Result<Deployment, GatewayError>) -> Self {
        match result {
            Ok(deployment) => Self {
                ok: true,
                deployment_id: deployment.external_id,
                version: deployment.version,
                error_kind: None,
            },
            Err(e) => Self {
                ok: false,
                error_kind: Some(e.kind()),
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct GatewayService {
    repo: Arc<dyn BackendRepository>,
    materializer: Arc<dyn ObjectMaterializer>,
    events: Arc<dyn EventSink>,
    secrets: SecretResolver,
    stubs: StubRegistry,
    deployments: DeploymentVersioner,
}

impl GatewayService {
    pub fn new(
        repo: Arc<dyn BackendRepository>,
        materializer: Arc<dyn ObjectMaterializer>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            secrets: SecretResolver::new(repo.clone()),
            stubs: StubRegistry::new(repo.clone()),
            deployments: DeploymentVersioner::new(repo.clone()),
            repo,
            materializer,
            events,
        }
    }

    pub fn repository(&self) -> &Arc<dyn BackendRepository> {
        &self.repo
    }

    /// Register a stub for the caller's workspace, or return the existing one
    pub async fn get_or_create_stub(
        &self,
        auth: &AuthInfo,
        request: GetOrCreateStubRequest,
    ) -> GetOrCreateStubResponse {
        let name = request.name.clone();
        let result = self.register_stub(auth, request).await;
        if let Err(ref e) = result {
            warn!(
                "GetOrCreateStub failed for '{}' in workspace {}: {}",
                name, auth.workspace.name, e
            );
        }
        GetOrCreateStubResponse::from_result(result)
    }

    /// Deploy a stub owned by the caller's workspace under `request.name`
    pub async fn deploy_stub(&self, auth: &AuthInfo, request: DeployStubRequest) -> DeployStubResponse {
        let result = self.deploy(auth, &request).await;
        if let Err(ref e) = result {
            warn!(
                "DeployStub failed for stub {} in workspace {}: {}",
                request.stub_id, auth.workspace.name, e
            );
        }
        DeployStubResponse::from_result(result)
    }

    async fn register_stub(
        &self,
        auth: &AuthInfo,
        request: GetOrCreateStubRequest,
    ) -> Result<Stub, GatewayError> {
        let workspace = &auth.workspace;
        let autoscaler = resolve_autoscaler(&request.autoscaler);
        let secrets = self.secrets.resolve(workspace, &request.secrets).await?;

        let object = self
            .repo
            .get_object_by_external_id(&request.object_id, workspace.id)
            .await?;
        self.materializer
            .materialize(&object.external_id, &workspace.name)
            .await?;

        let config = StubConfig {
            runtime: Runtime {
                cpu: request.cpu,
                gpu: GpuType::from(request.gpu),
                memory: request.memory,
                image_id: request.image_id,
            },
            handler: request.handler,
            on_start: request.on_start,
            callback_url: request.callback_url,
            python_version: request.python_version,
            task_policy: TaskPolicy {
                max_retries: request.retries,
                timeout: request.timeout,
            },
            keep_warm_seconds: request.keep_warm_seconds,
            workers: request.workers,
            max_pending_tasks: request.max_pending_tasks,
            volumes: request.volumes,
            authorized: request.authorized,
            secrets,
            autoscaler,
        };

        let stub_type = StubType::from(request.stub_type);
        let stub = self
            .stubs
            .get_or_create(
                &request.name,
                &stub_type,
                config,
                object.id,
                workspace.id,
                request.force_create,
            )
            .await?;
        Ok(stub)
    }

    async fn deploy(
        &self,
        auth: &AuthInfo,
        request: &DeployStubRequest,
    ) -> Result<Deployment, GatewayError> {
        let stub = self.repo.get_stub_by_external_id(&request.stub_id).await?;
        if stub.workspace_id != auth.workspace.id {
            return Err(GatewayError::Unauthorized(format!("stub '{}'", request.stub_id)));
        }

        let deployment = self
            .deployments
            .create_deployment(auth.workspace.id, &request.name, &stub.stub_type, stub.id)
            .await?;

        self.push_deploy_event(auth, &stub, &deployment);
        Ok(deployment)
    }

    fn push_deploy_event(&self, auth: &AuthInfo, stub: &Stub, deployment: &Deployment) {
        let events = self.events.clone();
        let event = DeployStubEvent {
            workspace_id: auth.workspace.external_id.clone(),
            stub_id: stub.external_id.clone(),
            stub_type: stub.stub_type.to_string(),
            deployment_name: deployment.name.clone(),
            version: deployment.version,
            timestamp: Utc::now(),
        };

        tokio::spawn(async move {
            if let Err(e) = events.push_deploy_stub_event(event).await {
                warn!("Failed to push deploy event: {}", e);
            }
        });
    }
}

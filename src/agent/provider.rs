//! Virtual node provider
//!
//! [`RemoteProvider`] presents the remote compute backend to the orchestrator
//! as a single node. Node status and pod lifecycle are separate capabilities
//! so callers can depend on only the half they use.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::bridge::{BridgeConfig, BridgeState, NodeStatusBridge, StatusCallback};
use super::pods::{Pod, PodLifecycleProxy, PodStatus, PodStore, PodStoreError};
use super::pressure::PressureSampler;
use super::probe::BackendProbe;
use super::AgentError;

/// Node health and status reporting
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// An error means the node is unhealthy
    async fn ping(&self) -> Result<(), AgentError>;

    /// Register the sink for periodic node status snapshots
    fn notify_node_status(&self, callback: StatusCallback) -> Result<(), AgentError>;
}

/// Pod operations for pods assigned to this node
#[async_trait]
pub trait PodLifecycle: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, PodStoreError>;
    async fn get_pods(&self) -> Result<Vec<Pod>, PodStoreError>;
    async fn get_pod_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodStatus>, PodStoreError>;
    async fn create_pod(&self, pod: Pod) -> Result<(), PodStoreError>;
    async fn update_pod(&self, pod: Pod) -> Result<(), PodStoreError>;
    async fn delete_pod(&self, pod: &Pod) -> Result<(), PodStoreError>;
}

pub struct RemoteProvider {
    bridge: NodeStatusBridge,
    pods: PodLifecycleProxy,
    root: CancellationToken,
}

impl RemoteProvider {
    pub fn new(
        config: BridgeConfig,
        probe: Arc<dyn BackendProbe>,
        sampler: Box<dyn PressureSampler>,
        store: Arc<dyn PodStore>,
    ) -> Self {
        let pods = PodLifecycleProxy::new(config.node_name.clone(), store);
        Self {
            bridge: NodeStatusBridge::new(config, probe, sampler),
            pods,
            root: CancellationToken::new(),
        }
    }

    pub fn node_name(&self) -> &str {
        self.bridge.node_name()
    }

    pub fn bridge_state(&self) -> BridgeState {
        self.bridge.state()
    }

    /// Token cancelled when the provider shuts down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Stop status reporting and wait for the loop to exit
    pub async fn shutdown(&self) {
        info!("Shutting down provider for node {}", self.node_name());
        self.root.cancel();
        self.bridge.stop().await;
    }
}

#[async_trait]
impl NodeProvider for RemoteProvider {
    async fn ping(&self) -> Result<(), AgentError> {
        self.bridge.ping().await
    }

    fn notify_node_status(&self, callback: StatusCallback) -> Result<(), AgentError> {
        self.bridge.start(&self.root, callback)
    }
}

#[async_trait]
impl PodLifecycle for RemoteProvider {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, PodStoreError> {
        self.pods.get_pod(namespace, name).await
    }

    async fn get_pods(&self) -> Result<Vec<Pod>, PodStoreError> {
        self.pods.get_pods().await
    }

    async fn get_pod_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodStatus>, PodStoreError> {
        self.pods.get_pod_status(namespace, name).await
    }

    async fn create_pod(&self, pod: Pod) -> Result<(), PodStoreError> {
        self.pods.create_pod(pod).await
    }

    async fn update_pod(&self, pod: Pod) -> Result<(), PodStoreError> {
        self.pods.update_pod(pod).await
    }

    async fn delete_pod(&self, pod: &Pod) -> Result<(), PodStoreError> {
        self.pods.delete_pod(pod).await
    }
}

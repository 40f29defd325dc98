//! Pod lifecycle pass-through
//!
//! The orchestrator's pod controller drives pods on this node through
//! [`PodLifecycleProxy`]. Mutations forward verbatim to the cluster's
//! [`PodStore`]; reads only ever surface pods assigned to this node.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::node::ConditionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodMetadata {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(rename = "creationTimestamp", default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Node the pod is assigned to
    #[serde(rename = "nodeName", default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: PodMetadata,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: PodMetadata {
                namespace: namespace.into(),
                name: name.into(),
                uid: uuid::Uuid::new_v4().to_string(),
                creation_timestamp: Some(Utc::now()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Assign the pod to a node
    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.spec.node_name = Some(node_name.into());
        self
    }

    pub fn with_container(mut self, name: impl Into<String>, image: impl Into<String>) -> Self {
        self.spec.containers.push(Container {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
        });
        self
    }

    pub fn is_assigned_to(&self, node_name: &str) -> bool {
        self.spec.node_name.as_deref() == Some(node_name)
    }

    fn key(&self) -> (String, String) {
        (self.metadata.namespace.clone(), self.metadata.name.clone())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PodStoreError {
    #[error("Pod not found: {0}")]
    NotFound(String),

    #[error("Pod already exists: {0}")]
    AlreadyExists(String),

    #[error("Pod store error: {0}")]
    Backend(String),
}

/// Pod storage owned by the cluster
#[async_trait]
pub trait PodStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Pod>, PodStoreError>;

    /// List pods, optionally restricted to a node. Implementations may ignore
    /// the hint.
    async fn list(&self, node_name: Option<&str>) -> Result<Vec<Pod>, PodStoreError>;

    async fn create(&self, pod: Pod) -> Result<(), PodStoreError>;

    async fn update(&self, pod: Pod) -> Result<(), PodStoreError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), PodStoreError>;
}

/// In-memory pod store
#[derive(Debug, Default)]
pub struct InMemoryPodStore {
    pods: DashMap<(String, String), Pod>,
}

impl InMemoryPodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

fn display_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

#[async_trait]
impl PodStore for InMemoryPodStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Pod>, PodStoreError> {
        Ok(self
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .map(|p| p.value().clone()))
    }

    async fn list(&self, node_name: Option<&str>) -> Result<Vec<Pod>, PodStoreError> {
        Ok(self
            .pods
            .iter()
            .filter(|p| node_name.map_or(true, |n| p.is_assigned_to(n)))
            .map(|p| p.value().clone())
            .collect())
    }

    async fn create(&self, pod: Pod) -> Result<(), PodStoreError> {
        match self.pods.entry(pod.key()) {
            Entry::Occupied(_) => Err(PodStoreError::AlreadyExists(display_key(
                &pod.metadata.namespace,
                &pod.metadata.name,
            ))),
            Entry::Vacant(entry) => {
                entry.insert(pod);
                Ok(())
            }
        }
    }

    async fn update(&self, pod: Pod) -> Result<(), PodStoreError> {
        match self.pods.get_mut(&pod.key()) {
            Some(mut existing) => {
                *existing = pod;
                Ok(())
            }
            None => Err(PodStoreError::NotFound(display_key(
                &pod.metadata.namespace,
                &pod.metadata.name,
            ))),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), PodStoreError> {
        self.pods
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| PodStoreError::NotFound(display_key(namespace, name)))
    }
}

/// Pod operations scoped to one node
pub struct PodLifecycleProxy {
    node_name: String,
    store: Arc<dyn PodStore>,
}

impl PodLifecycleProxy {
    pub fn new(node_name: impl Into<String>, store: Arc<dyn PodStore>) -> Self {
        Self {
            node_name: node_name.into(),
            store,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// A pod by namespace and name, or `None` if it is absent or assigned
    /// to another node
    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, PodStoreError> {
        let pod = self.store.get(namespace, name).await?;
        Ok(pod.filter(|p| p.is_assigned_to(&self.node_name)))
    }

    /// All pods assigned to this node
    pub async fn get_pods(&self) -> Result<Vec<Pod>, PodStoreError> {
        let pods = self.store.list(Some(&self.node_name)).await?;
        let total = pods.len();
        let owned: Vec<Pod> = pods
            .into_iter()
            .filter(|p| p.is_assigned_to(&self.node_name))
            .collect();

        if owned.len() != total {
            debug!(
                "Dropped {} pods not assigned to node {}",
                total - owned.len(),
                self.node_name
            );
        }
        Ok(owned)
    }

    pub async fn get_pod_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodStatus>, PodStoreError> {
        Ok(self.get_pod(namespace, name).await?.map(|p| p.status))
    }

    pub async fn create_pod(&self, pod: Pod) -> Result<(), PodStoreError> {
        debug!(
            "Creating pod {}/{}",
            pod.metadata.namespace, pod.metadata.name
        );
        self.store.create(pod).await
    }

    pub async fn update_pod(&self, pod: Pod) -> Result<(), PodStoreError> {
        self.store.update(pod).await
    }

    pub async fn delete_pod(&self, pod: &Pod) -> Result<(), PodStoreError> {
        self.store
            .delete(&pod.metadata.namespace, &pod.metadata.name)
            .await
    }
}

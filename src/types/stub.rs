//! Stub resource - a registered serverless workload definition
//!
//! A Stub binds together:
//! - The runtime shape (cpu, gpu, memory, image)
//! - The handler and its task policy
//! - Resolved secrets and a fully-populated autoscaler policy
//! - A reference to the uploaded code object

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::secret::Secret;

/// Kind of workload a stub describes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StubType {
    Function,
    TaskQueue,
    Endpoint,
    Other(String),
}

impl StubType {
    pub fn as_str(&self) -> &str {
        match self {
            StubType::Function => "function",
            StubType::TaskQueue => "taskqueue",
            StubType::Endpoint => "endpoint",
            StubType::Other(s) => s,
        }
    }
}

impl From<String> for StubType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "function" => StubType::Function,
            "taskqueue" => StubType::TaskQueue,
            "endpoint" => StubType::Endpoint,
            _ => StubType::Other(s),
        }
    }
}

impl From<&str> for StubType {
    fn from(s: &str) -> Self {
        StubType::from(s.to_string())
    }
}

impl From<StubType> for String {
    fn from(t: StubType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for StubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPU model requested by a stub. An empty string means no GPU.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GpuType {
    #[default]
    None,
    T4,
    A10G,
    A100,
    L4,
    H100,
    Other(String),
}

impl GpuType {
    pub fn as_str(&self) -> &str {
        match self {
            GpuType::None => "",
            GpuType::T4 => "T4",
            GpuType::A10G => "A10G",
            GpuType::A100 => "A100",
            GpuType::L4 => "L4",
            GpuType::H100 => "H100",
            GpuType::Other(s) => s,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, GpuType::None)
    }
}

impl From<String> for GpuType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" => GpuType::None,
            "T4" => GpuType::T4,
            "A10G" => GpuType::A10G,
            "A100" => GpuType::A100,
            "L4" => GpuType::L4,
            "H100" => GpuType::H100,
            _ => GpuType::Other(s),
        }
    }
}

impl From<GpuType> for String {
    fn from(g: GpuType) -> Self {
        g.as_str().to_string()
    }
}

/// Runtime shape of a stub's containers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runtime {
    /// CPU in millicores
    pub cpu: i64,

    /// GPU model (empty = none)
    #[serde(default)]
    pub gpu: GpuType,

    /// Memory in MiB
    pub memory: i64,

    /// Container image reference
    pub image_id: String,
}

/// Retry and timeout policy for individual tasks
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPolicy {
    pub max_retries: u32,

    /// Timeout in seconds
    pub timeout: i64,
}

/// Autoscaling strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AutoscalerType {
    /// Scale on the depth of the pending task queue
    QueueDepth,
    Other(String),
}

impl AutoscalerType {
    pub fn as_str(&self) -> &str {
        match self {
            AutoscalerType::QueueDepth => "queue_depth",
            AutoscalerType::Other(s) => s,
        }
    }
}

impl From<String> for AutoscalerType {
    fn from(s: String) -> Self {
        if s == "queue_depth" {
            AutoscalerType::QueueDepth
        } else {
            AutoscalerType::Other(s)
        }
    }
}

impl From<AutoscalerType> for String {
    fn from(t: AutoscalerType) -> Self {
        t.as_str().to_string()
    }
}

/// Effective autoscaling policy stored on a stub. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerPolicy {
    #[serde(rename = "type")]
    pub kind: AutoscalerType,
    pub max_containers: u32,
    pub tasks_per_container: u32,
}

impl Default for AutoscalerPolicy {
    fn default() -> Self {
        Self {
            kind: AutoscalerType::QueueDepth,
            max_containers: 1,
            tasks_per_container: 1,
        }
    }
}

/// Complete configuration of a stub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubConfig {
    pub runtime: Runtime,
    pub handler: String,
    #[serde(default)]
    pub on_start: String,
    #[serde(default)]
    pub callback_url: String,
    #[serde(default)]
    pub python_version: String,
    pub task_policy: TaskPolicy,
    pub keep_warm_seconds: u32,
    pub workers: u32,
    pub max_pending_tasks: u32,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    pub authorized: bool,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    pub autoscaler: AutoscalerPolicy,
}

/// A volume mounted into the stub's containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    pub mount_path: String,
}

/// A registered stub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stub {
    pub id: u64,
    pub external_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stub_type: StubType,
    pub workspace_id: u64,
    pub object_id: u64,
    pub config: StubConfig,
    pub created_at: DateTime<Utc>,
}

impl Stub {
    pub fn key(&self) -> StubKey {
        StubKey::new(self.workspace_id, &self.name, self.stub_type.clone())
    }
}

/// Identity used for idempotent stub lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StubKey {
    pub workspace_id: u64,
    pub name: String,
    pub stub_type: StubType,
}

impl StubKey {
    pub fn new(workspace_id: u64, name: impl Into<String>, stub_type: StubType) -> Self {
        Self {
            workspace_id,
            name: name.into(),
            stub_type,
        }
    }

    /// Stable hex digest of the key, suitable as a persisted unique index.
    /// String fields are length-prefixed so no two keys share an encoding.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.workspace_id.to_be_bytes());
        for field in [self.name.as_str(), self.stub_type.as_str()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_type_round_trips_known_names() {
        assert_eq!(StubType::from("function"), StubType::Function);
        assert_eq!(StubType::from("taskqueue"), StubType::TaskQueue);
        assert_eq!(
            StubType::from("cron"),
            StubType::Other("cron".to_string())
        );
        assert_eq!(StubType::Endpoint.to_string(), "endpoint");
    }

    #[test]
    fn test_gpu_type_empty_is_none() {
        assert!(GpuType::from(String::new()).is_none());
        assert_eq!(GpuType::from("A10G".to_string()), GpuType::A10G);
    }

    #[test]
    fn test_default_autoscaler_policy() {
        let policy = AutoscalerPolicy::default();
        assert_eq!(policy.kind, AutoscalerType::QueueDepth);
        assert_eq!(policy.max_containers, 1);
        assert_eq!(policy.tasks_per_container, 1);
    }

    #[test]
    fn test_autoscaler_policy_json_shape() {
        let json = serde_json::to_value(AutoscalerPolicy::default()).unwrap();
        assert_eq!(json["type"], "queue_depth");
        assert_eq!(json["maxContainers"], 1);
        assert_eq!(json["tasksPerContainer"], 1);
    }

    #[test]
    fn test_fingerprint_depends_on_every_field() {
        let base = StubKey::new(1, "app", StubType::Function);
        assert_eq!(
            base.fingerprint(),
            StubKey::new(1, "app", StubType::Function).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            StubKey::new(2, "app", StubType::Function).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            StubKey::new(1, "app2", StubType::Function).fingerprint()
        );
        assert_ne!(
            base.fingerprint(),
            StubKey::new(1, "app", StubType::Endpoint).fingerprint()
        );
    }

    #[test]
    fn test_fingerprint_field_boundaries_are_unambiguous() {
        let left = StubKey::new(1, "x\0y", StubType::Other("z".to_string()));
        let right = StubKey::new(1, "x", StubType::Other("y\0z".to_string()));
        assert_ne!(left, right);
        assert_ne!(left.fingerprint(), right.fingerprint());
    }
}

//! # Node Agent
//!
//! Presents the remote compute backend to the orchestrator as a virtual node.
//!
//! - [`NodeStatusBridge`] pushes a status snapshot every interval until its
//!   cancellation token fires
//! - [`PodLifecycleProxy`] forwards pod operations to the cluster's pod
//!   store, scoped to this node
//! - [`RemoteProvider`] ties both together behind the [`NodeProvider`] and
//!   [`PodLifecycle`] capabilities

pub mod bridge;
pub mod node;
pub mod pods;
pub mod pressure;
pub mod probe;
pub mod provider;

pub use bridge::{BridgeConfig, BridgeState, NodeStatusBridge, StatusCallback};
pub use node::{ConditionStatus, NodeCondition, NodeConditionType, NodeStatusSnapshot};
pub use pods::{InMemoryPodStore, Pod, PodLifecycleProxy, PodPhase, PodStatus, PodStore, PodStoreError};
pub use pressure::{PressureReading, PressureSampler, PressureThresholds, SystemPressureSampler};
pub use probe::{BackendProbe, HttpBackendProbe, NoopProbe};
pub use provider::{NodeProvider, PodLifecycle, RemoteProvider};

use thiserror::Error;

/// Default node status interval in seconds
pub const NODE_STATUS_INTERVAL_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Backend unreachable: {0}")]
    Connectivity(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Node status bridge already started")]
    AlreadyStarted,

    #[error("Invalid node status interval: {0:?}")]
    InvalidInterval(std::time::Duration),
}

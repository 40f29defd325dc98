//! Node status reported to the orchestrator's node controller
//!
//! A snapshot is a set of named conditions, each either true, false or
//! unknown, stamped with heartbeat and transition times. Snapshots are
//! emitted to a callback and never persisted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of node conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeConditionType {
    /// Node is ready to accept pods
    Ready,
    /// Node is running low on disk
    DiskPressure,
    /// Node is running low on memory
    MemoryPressure,
    /// Node is running too many processes
    PIDPressure,
    /// Network to the compute backend is down
    NetworkUnavailable,
}

impl NodeConditionType {
    pub const ALL: [NodeConditionType; 5] = [
        NodeConditionType::Ready,
        NodeConditionType::DiskPressure,
        NodeConditionType::MemoryPressure,
        NodeConditionType::PIDPressure,
        NodeConditionType::NetworkUnavailable,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(b: bool) -> Self {
        if b {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// A condition of a Node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCondition {
    /// Type of condition
    #[serde(rename = "type")]
    pub condition_type: NodeConditionType,

    pub status: ConditionStatus,

    #[serde(rename = "lastHeartbeatTime")]
    pub last_heartbeat_time: DateTime<Utc>,

    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,
}

impl NodeCondition {
    pub fn new(
        condition_type: NodeConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            condition_type,
            status,
            last_heartbeat_time: now,
            last_transition_time: now,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Create a Ready condition
    pub fn ready(status: bool, reason: &str, message: &str) -> Self {
        Self::new(NodeConditionType::Ready, status.into(), reason, message)
    }
}

/// Point-in-time status of this node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatusSnapshot {
    #[serde(rename = "nodeName")]
    pub node_name: String,

    pub conditions: Vec<NodeCondition>,
}

impl NodeStatusSnapshot {
    pub fn condition(&self, condition_type: NodeConditionType) -> Option<&NodeCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Whether the Ready condition is present and true
    pub fn is_ready(&self) -> bool {
        self.condition(NodeConditionType::Ready)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}

//! Effective autoscaler policy for a stub
//!
//! Callers may omit the autoscaler entirely. In that case the stub scales on
//! queue depth with a single container handling one task at a time. A named
//! kind is taken verbatim together with its counts; count plausibility is not
//! checked here.

use serde::{Deserialize, Serialize};

use crate::types::{AutoscalerPolicy, AutoscalerType};

/// Autoscaler settings as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerRequest {
    /// Strategy name; empty selects the default policy
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub max_containers: u32,

    #[serde(default)]
    pub tasks_per_container: u32,
}

/// Compute the fully-populated policy stored on a stub
pub fn resolve_autoscaler(request: &AutoscalerRequest) -> AutoscalerPolicy {
    if request.kind.is_empty() {
        return AutoscalerPolicy::default();
    }

    AutoscalerPolicy {
        kind: AutoscalerType::from(request.kind.clone()),
        max_containers: request.max_containers,
        tasks_per_container: request.tasks_per_container,
    }
}

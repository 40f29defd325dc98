//! Tenancy records: workspaces and the code objects uploaded into them

use serde::{Deserialize, Serialize};

/// Tenant-scoping boundary for stubs, secrets, objects and deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: u64,
    pub external_id: String,
    pub name: String,
}

/// An uploaded code archive referenced by stubs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub id: u64,
    pub external_id: String,
    pub workspace_id: u64,
    pub hash: String,
    pub size: u64,
}

/// The authenticated caller of a gateway operation
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub workspace: Workspace,
    pub token: String,
}

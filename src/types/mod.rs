//! Domain records shared by the gateway and the repository

pub mod deployment;
pub mod secret;
pub mod stub;
pub mod workspace;

pub use deployment::{Deployment, DeploymentKey};
pub use secret::{Secret, SecretRequest};
pub use stub::{
    AutoscalerPolicy, AutoscalerType, GpuType, Runtime, Stub, StubConfig, StubKey, StubType,
    TaskPolicy, Volume,
};
pub use workspace::{AuthInfo, Object, Workspace};

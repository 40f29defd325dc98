//! # Stub Gateway
//!
//! Registration and versioning of stubs inside a workspace.
//!
//! ```text
//!   GetOrCreateStub                          DeployStub
//!        │                                        │
//!        ▼                                        ▼
//! ┌──────────────┐ ┌──────────────┐       ┌──────────────┐
//! │SecretResolver│ │  Autoscaler  │       │ stub lookup  │
//! │              │ │  resolution  │       │ + ownership  │
//! └──────┬───────┘ └──────┬───────┘       └──────┬───────┘
//!        └───────┬────────┘                      ▼
//!                ▼                        ┌──────────────┐
//!        ┌──────────────┐                 │  Deployment  │
//!        │   Object     │                 │  Versioner   │
//!        │ Materializer │                 └──────┬───────┘
//!        └──────┬───────┘                        ▼
//!               ▼                          DeployStubEvent
//!        ┌──────────────┐
//!        │ StubRegistry │
//!        └──────────────┘
//! ```

pub mod api;
pub mod autoscaler;
pub mod deployments;
pub mod secrets;
pub mod service;
pub mod stubs;

pub use api::{create_gateway_router, GatewayState, DEFAULT_MAX_CONCURRENT};
pub use autoscaler::{resolve_autoscaler, AutoscalerRequest};
pub use deployments::DeploymentVersioner;
pub use secrets::SecretResolver;
pub use service::{
    DeployStubRequest, DeployStubResponse, ErrorKind, GatewayError, GatewayService,
    GetOrCreateStubRequest, GetOrCreateStubResponse,
};
pub use stubs::StubRegistry;

/// Default gateway API port
pub const GATEWAY_PORT: u16 = 1993;

//! Gateway HTTP API
//!
//! Exposes stub registration and deployment over REST:
//! - `POST /v1/stubs` - get or create a stub
//! - `POST /v1/stubs/{stub_id}/deploy` - deploy a stub under a name
//! - `GET /health` - liveness
//!
//! Callers authenticate with `Authorization: Bearer <token>`. The token
//! resolves to the workspace every operation is scoped to.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::service::{DeployStubRequest, GatewayService, GetOrCreateStubRequest};
use crate::types::AuthInfo;

/// Default cap on in-flight gateway requests
pub const DEFAULT_MAX_CONCURRENT: usize = 256;

/// Shared state for the gateway API
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<GatewayService>,
}

impl GatewayState {
    pub fn new(service: GatewayService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Create the gateway router
pub fn create_gateway_router(state: GatewayState, max_concurrent: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/stubs", post(get_or_create_stub))
        .route("/v1/stubs/{stub_id}/deploy", post(deploy_stub))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status body for requests rejected before reaching the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatus {
    pub success: bool,
    pub message: String,
}

impl OperationStatus {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn authenticate(state: &GatewayState, headers: &HeaderMap) -> Result<AuthInfo, Response> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(OperationStatus::failure("Invalid or missing bearer token")),
        )
            .into_response()
    };

    let token = bearer_token(headers).ok_or_else(unauthorized)?;
    match state.service.repository().authorize(token).await {
        Ok(workspace) => Ok(AuthInfo {
            workspace,
            token: token.to_string(),
        }),
        Err(e) => {
            debug!("Rejected token: {}", e);
            Err(unauthorized())
        }
    }
}

async fn get_or_create_stub(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(request): Json<GetOrCreateStubRequest>,
) -> Response {
    let auth = match authenticate(&state, &headers).await {
        Ok(auth) => auth,
        Err(rejection) => return rejection,
    };

    Json(state.service.get_or_create_stub(&auth, request).await).into_response()
}

#[derive(Debug, Deserialize)]
struct DeployBody {
    name: String,
}

async fn deploy_stub(
    State(state): State<GatewayState>,
    Path(stub_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DeployBody>,
) -> Response {
    let auth = match authenticate(&state, &headers).await {
        Ok(auth) => auth,
        Err(rejection) => return rejection,
    };

    let request = DeployStubRequest {
        stub_id,
        name: body.name,
    };
    Json(state.service.deploy_stub(&auth, request).await).into_response()
}

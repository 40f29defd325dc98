//! Integration tests for the stub gateway API
//!
//! Runs the gateway on a local port, seeded from a config the same way
//! `stubnet serve` does, and drives it over HTTP.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;

use stubnet::config::{seed_repository, Config, WorkspaceConfig};
use stubnet::events::LogEventSink;
use stubnet::gateway::{create_gateway_router, GatewayService, GatewayState};
use stubnet::objects::FsObjectMaterializer;
use stubnet::repository::InMemoryBackendRepository;

/// Find an available port for testing
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to address")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

fn workspace(name: &str, token: &str, secrets: &[(&str, &str)]) -> WorkspaceConfig {
    WorkspaceConfig {
        name: name.to_string(),
        token: token.to_string(),
        secrets: secrets
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        secrets_file: None,
    }
}

struct TestGateway {
    base_url: String,
    client: reqwest::Client,
    _objects: TempDir,
}

impl TestGateway {
    async fn start() -> Self {
        let objects = TempDir::new().unwrap();
        for (ws, object) in [("acme", "obj-acme"), ("globex", "obj-globex")] {
            let dir = objects.path().join(ws);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(object), b"code archive").unwrap();
        }

        let mut config = Config::default();
        config.gateway.objects_path = objects.path().to_string_lossy().into_owned();
        config.workspaces = vec![
            workspace("acme", "token-acme", &[("API_KEY", "abc")]),
            workspace("globex", "token-globex", &[]),
        ];

        let repo = Arc::new(InMemoryBackendRepository::new());
        seed_repository(&config, &repo).unwrap();

        let service = GatewayService::new(
            repo,
            Arc::new(FsObjectMaterializer::new(config.gateway.objects_root())),
            Arc::new(LogEventSink),
        );
        let app = create_gateway_router(GatewayState::new(service), 16);

        let port = find_available_port();
        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
            .await
            .expect("Failed to bind gateway");
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give server time to start
        sleep(Duration::from_millis(100)).await;

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            _objects: objects,
        }
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.expect("request failed");
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn register(&self, token: &str, body: Value) -> Value {
        let (status, body) = self.post("/v1/stubs", Some(token), body).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn deploy(&self, token: &str, stub_id: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                &format!("/v1/stubs/{}/deploy", stub_id),
                Some(token),
                json!({ "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

fn function_stub(name: &str, object_id: &str) -> Value {
    json!({
        "name": name,
        "stubType": "function",
        "cpu": 1000,
        "memory": 128,
        "handler": "app:handler",
        "objectId": object_id,
        "secrets": [{ "name": "API_KEY" }, { "name": "MISSING" }],
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let gateway = TestGateway::start().await;

    let response = gateway
        .client
        .get(format!("{}/health", gateway.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_register_is_idempotent_and_deploys_are_versioned() {
    let gateway = TestGateway::start().await;

    let first = gateway
        .register("token-acme", function_stub("app", "obj-acme"))
        .await;
    assert_eq!(first["ok"], true);
    let stub_id = first["stubId"].as_str().unwrap().to_string();

    let second = gateway
        .register("token-acme", function_stub("app", "obj-acme"))
        .await;
    assert_eq!(second["stubId"], stub_id.as_str());

    for expected in 1..=3 {
        let deployed = gateway.deploy("token-acme", &stub_id, "prod").await;
        assert_eq!(deployed["ok"], true);
        assert_eq!(deployed["version"], expected);
    }

    // Versions are tracked per deployment name
    let staging = gateway.deploy("token-acme", &stub_id, "staging").await;
    assert_eq!(staging["version"], 1);
}

#[tokio::test]
async fn test_force_create_registers_new_stub() {
    let gateway = TestGateway::start().await;

    let mut body = function_stub("app", "obj-acme");
    body["forceCreate"] = json!(true);

    let first = gateway.register("token-acme", body.clone()).await;
    let second = gateway.register("token-acme", body).await;
    assert_eq!(first["ok"], true);
    assert_eq!(second["ok"], true);
    assert_ne!(first["stubId"], second["stubId"]);
}

#[tokio::test]
async fn test_cross_workspace_access_is_rejected() {
    let gateway = TestGateway::start().await;

    let registered = gateway
        .register("token-acme", function_stub("app", "obj-acme"))
        .await;
    let stub_id = registered["stubId"].as_str().unwrap();

    let deployed = gateway.deploy("token-globex", stub_id, "prod").await;
    assert_eq!(deployed["ok"], false);
    assert_eq!(deployed["errorKind"], "authorization_mismatch");

    // Objects are scoped to their workspace too
    let foreign_object = gateway
        .register("token-globex", function_stub("app", "obj-acme"))
        .await;
    assert_eq!(foreign_object["ok"], false);
    assert_eq!(foreign_object["errorKind"], "not_found");
}

#[tokio::test]
async fn test_deploy_unknown_stub() {
    let gateway = TestGateway::start().await;

    let deployed = gateway.deploy("token-acme", "does-not-exist", "prod").await;
    assert_eq!(deployed["ok"], false);
    assert_eq!(deployed["errorKind"], "not_found");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let gateway = TestGateway::start().await;

    let (status, _) = gateway
        .post("/v1/stubs", None, function_stub("app", "obj-acme"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = gateway
        .post("/v1/stubs", Some("bogus"), function_stub("app", "obj-acme"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

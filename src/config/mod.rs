//! Configuration for the gateway and the node agent
//!
//! Read from `~/.stubnet/config.yaml` unless another path is given. A missing
//! file yields the defaults.

pub mod secrets;

pub use secrets::{load_env_file, merge_secrets, SecretError};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::agent::{PressureThresholds, NODE_STATUS_INTERVAL_SECS};
use crate::gateway::{DEFAULT_MAX_CONCURRENT, GATEWAY_PORT};
use crate::repository::InMemoryBackendRepository;

/// Default config file location: ~/.stubnet/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stubnet")
        .join("config.yaml")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub workspaces: Vec<WorkspaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_address")]
    pub bind_addr: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Directory holding uploaded code objects, `~` is expanded
    #[serde(default = "default_objects_path")]
    pub objects_path: String,

    /// Cap on in-flight API requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_address(),
            port: GATEWAY_PORT,
            objects_path: default_objects_path(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl GatewayConfig {
    pub fn objects_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.objects_path).into_owned())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Node name (default: this host's name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Base URL of the compute backend to probe. Without one the node
    /// always reports ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,

    #[serde(default = "default_pressure_percent")]
    pub memory_pressure_percent: f64,

    #[serde(default = "default_pressure_percent")]
    pub disk_pressure_percent: f64,

    #[serde(default = "default_max_processes")]
    pub max_processes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: None,
            status_interval_secs: NODE_STATUS_INTERVAL_SECS,
            backend_url: None,
            ping_timeout_secs: default_ping_timeout(),
            memory_pressure_percent: default_pressure_percent(),
            disk_pressure_percent: default_pressure_percent(),
            max_processes: default_max_processes(),
        }
    }
}

impl AgentConfig {
    /// Configured node name, falling back to the hostname
    pub fn effective_node_name(&self) -> String {
        self.node_name
            .clone()
            .or_else(|| {
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
            })
            .unwrap_or_else(|| "stubnet-node".to_string())
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn thresholds(&self) -> PressureThresholds {
        PressureThresholds {
            memory_percent: self.memory_pressure_percent,
            disk_percent: self.disk_pressure_percent,
            max_processes: self.max_processes,
        }
    }
}

/// A workspace and the bearer token that authenticates as it
#[derive(Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,

    pub token: String,

    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Optional `.env` file with more secrets, `~` is expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<String>,
}

impl fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.secrets.keys().collect();
        names.sort();
        f.debug_struct("WorkspaceConfig")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("secrets", &names)
            .field("secrets_file", &self.secrets_file)
            .finish()
    }
}

impl WorkspaceConfig {
    /// All secrets for this workspace
    pub fn resolve_secrets(&self) -> Result<HashMap<String, String>, SecretError> {
        let from_file = match &self.secrets_file {
            Some(path) => load_env_file(Path::new(shellexpand::tilde(path).as_ref()))?,
            None => HashMap::new(),
        };
        Ok(merge_secrets(from_file, &self.secrets))
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    GATEWAY_PORT
}

fn default_objects_path() -> String {
    "~/.stubnet/objects".to_string()
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_status_interval() -> u64 {
    NODE_STATUS_INTERVAL_SECS
}

fn default_ping_timeout() -> u64 {
    5
}

fn default_pressure_percent() -> f64 {
    90.0
}

fn default_max_processes() -> usize {
    32768
}

// ============================================================================
// Pure parsing and validation
// ============================================================================

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn serialize_config(config: &Config) -> Result<String, ConfigError> {
    serde_yaml::to_string(config).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Reject configs that could not be served unambiguously
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.agent.status_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "agent.status_interval_secs must be positive".to_string(),
        ));
    }

    let mut names = HashSet::new();
    let mut tokens = HashSet::new();
    for ws in &config.workspaces {
        if ws.name.is_empty() {
            return Err(ConfigError::Invalid("workspace name is empty".to_string()));
        }
        if ws.token.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "workspace '{}' has an empty token",
                ws.name
            )));
        }
        if !names.insert(ws.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate workspace '{}'",
                ws.name
            )));
        }
        if !tokens.insert(ws.token.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "workspace '{}' reuses another workspace's token",
                ws.name
            )));
        }
    }
    Ok(())
}

// ============================================================================
// I/O boundary
// ============================================================================

/// Load config from a path. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// What [`seed_repository`] registered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub workspaces: usize,
    pub secrets: usize,
    pub objects: usize,
}

/// Register configured workspaces, their secrets and any code objects already
/// on disk under `<objects root>/<workspace name>/`.
pub fn seed_repository(
    config: &Config,
    repo: &InMemoryBackendRepository,
) -> Result<SeedSummary, ConfigError> {
    let objects_root = config.gateway.objects_root();
    let mut summary = SeedSummary::default();

    for ws_config in &config.workspaces {
        let workspace = repo.add_workspace(&ws_config.name, &ws_config.token);
        summary.workspaces += 1;

        for (name, value) in ws_config.resolve_secrets()? {
            repo.put_secret(workspace.id, name, value);
            summary.secrets += 1;
        }

        let dir = objects_root.join(&workspace.name);
        if !dir.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(external_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let bytes = std::fs::read(entry.path())?;
            let hash = format!("{:x}", Sha256::digest(&bytes));
            repo.register_object(workspace.id, external_id, hash, bytes.len() as u64);
            summary.objects += 1;
        }
    }

    info!(
        "Seeded {} workspaces, {} secrets, {} objects",
        summary.workspaces, summary.secrets, summary.objects
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    use crate::repository::BackendRepository;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.gateway.port, GATEWAY_PORT);
        assert_eq!(config.gateway.bind_addr, "0.0.0.0");
        assert_eq!(config.agent.status_interval_secs, 10);
        assert_eq!(config.agent.thresholds(), PressureThresholds::default());
        assert!(config.workspaces.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
gateway:
  bind_addr: 127.0.0.1
  port: 9000
  objects_path: /srv/objects
agent:
  node_name: edge-1
  status_interval_secs: 30
  backend_url: http://backend:1993
  memory_pressure_percent: 75.5
workspaces:
  - name: acme
    token: t-acme
    secrets:
      API_KEY: abc
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.gateway.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.gateway.objects_root(), PathBuf::from("/srv/objects"));
        assert_eq!(config.agent.effective_node_name(), "edge-1");
        assert_eq!(config.agent.status_interval(), Duration::from_secs(30));
        assert_eq!(config.agent.thresholds().memory_percent, 75.5);
        assert_eq!(config.agent.ping_timeout(), Duration::from_secs(5));
        assert_eq!(config.workspaces[0].secrets["API_KEY"], "abc");
    }

    #[test]
    fn test_objects_path_expands_home() {
        let gateway = GatewayConfig::default();
        assert!(!gateway.objects_root().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_node_name_falls_back_to_hostname() {
        let agent = AgentConfig::default();
        assert!(!agent.effective_node_name().is_empty());
    }

    #[test]
    fn test_rejects_duplicate_tokens() {
        let yaml = r#"
workspaces:
  - { name: a, token: same }
  - { name: b, token: same }
"#;
        assert!(matches!(parse_config(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let yaml = "agent:\n  status_interval_secs: 0\n";
        assert!(matches!(parse_config(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_config("gateway: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = load_config_from(Path::new("/nonexistent/config.yaml")).unwrap();
        assert_eq!(config.gateway.port, GATEWAY_PORT);
    }

    #[test]
    fn test_serialize_round_trip_keeps_workspaces() {
        let mut config = Config::default();
        config.workspaces.push(WorkspaceConfig {
            name: "acme".to_string(),
            token: "t".to_string(),
            secrets: HashMap::new(),
            secrets_file: None,
        });
        let yaml = serialize_config(&config).unwrap();
        let parsed = parse_config(&yaml).unwrap();
        assert_eq!(parsed.workspaces.len(), 1);
        assert_eq!(parsed.workspaces[0].name, "acme");
    }

    #[test]
    fn test_workspace_debug_redacts_token() {
        let ws = WorkspaceConfig {
            name: "acme".to_string(),
            token: "super-secret".to_string(),
            secrets: HashMap::from([("API_KEY".to_string(), "hidden".to_string())]),
            secrets_file: None,
        };
        let debug = format!("{:?}", ws);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("hidden"));
        assert!(debug.contains("API_KEY"));
    }

    #[tokio::test]
    async fn test_seed_repository() {
        let objects = TempDir::new().unwrap();
        let ws_dir = objects.path().join("acme");
        std::fs::create_dir_all(ws_dir.join("obj-1.d")).unwrap();
        std::fs::write(ws_dir.join("obj-1"), b"archive bytes").unwrap();

        let mut env_file = NamedTempFile::new().unwrap();
        writeln!(env_file, "FROM_FILE=1").unwrap();

        let mut config = Config::default();
        config.gateway.objects_path = objects.path().to_string_lossy().into_owned();
        config.workspaces.push(WorkspaceConfig {
            name: "acme".to_string(),
            token: "t-acme".to_string(),
            secrets: HashMap::from([("INLINE".to_string(), "2".to_string())]),
            secrets_file: Some(env_file.path().to_string_lossy().into_owned()),
        });

        let repo = InMemoryBackendRepository::new();
        let summary = seed_repository(&config, &repo).unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                workspaces: 1,
                secrets: 2,
                objects: 1
            }
        );

        let workspace = repo.authorize("t-acme").await.unwrap();
        assert_eq!(workspace.name, "acme");
        let secret = repo.get_secret_by_name(&workspace, "FROM_FILE").await.unwrap();
        assert_eq!(secret.value, "1");

        let object = repo
            .get_object_by_external_id("obj-1", workspace.id)
            .await
            .unwrap();
        assert_eq!(object.size, 13);
        assert_eq!(object.hash.len(), 64);
    }

    #[tokio::test]
    async fn test_seed_same_file_name_in_two_workspaces() {
        let objects = TempDir::new().unwrap();
        for (ws, bytes) in [("a", &b"first"[..]), ("b", &b"second archive"[..])] {
            let dir = objects.path().join(ws);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("app.zip"), bytes).unwrap();
        }

        let mut config = Config::default();
        config.gateway.objects_path = objects.path().to_string_lossy().into_owned();
        for (name, token) in [("a", "t-a"), ("b", "t-b")] {
            config.workspaces.push(WorkspaceConfig {
                name: name.to_string(),
                token: token.to_string(),
                secrets: HashMap::new(),
                secrets_file: None,
            });
        }

        let repo = InMemoryBackendRepository::new();
        assert_eq!(seed_repository(&config, &repo).unwrap().objects, 2);

        let a = repo.authorize("t-a").await.unwrap();
        let b = repo.authorize("t-b").await.unwrap();
        let in_a = repo.get_object_by_external_id("app.zip", a.id).await.unwrap();
        let in_b = repo.get_object_by_external_id("app.zip", b.id).await.unwrap();
        assert_eq!(in_a.size, 5);
        assert_eq!(in_b.size, 14);
    }

    #[test]
    fn test_validate_rejects_zero_interval_set_in_code() {
        let mut config = Config::default();
        assert!(validate_config(&config).is_ok());
        config.agent.status_interval_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}

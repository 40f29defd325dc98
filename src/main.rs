use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use stubnet::agent::{
    BackendProbe, BridgeConfig, HttpBackendProbe, InMemoryPodStore, NodeProvider, NoopProbe,
    NodeStatusSnapshot, RemoteProvider, SystemPressureSampler,
};
use stubnet::cli::{apply_overrides, format_config_summary, format_node_status, Cli, Commands};
use stubnet::config::{default_config_path, load_config_from, seed_repository, Config};
use stubnet::events::LogEventSink;
use stubnet::gateway::{create_gateway_router, GatewayService, GatewayState};
use stubnet::objects::FsObjectMaterializer;
use stubnet::repository::InMemoryBackendRepository;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(ref env_file) = cli.env_file {
        dotenvy::from_path(env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
    }

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    apply_overrides(&mut config, &cli.command).context("Invalid command line overrides")?;

    match cli.command {
        Commands::Serve(_) => serve(config).await,
        Commands::Agent(_) => agent(config).await,
        Commands::CheckConfig => {
            println!("{}", format_config_summary(&config, &config_path));
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let repo = Arc::new(InMemoryBackendRepository::new());
    seed_repository(&config, &repo).context("Failed to seed workspaces")?;

    let objects_root: PathBuf = config.gateway.objects_root();
    let service = GatewayService::new(
        repo,
        Arc::new(FsObjectMaterializer::new(objects_root.clone())),
        Arc::new(LogEventSink),
    );
    let app = create_gateway_router(GatewayState::new(service), config.gateway.max_concurrent);

    let addr = config.gateway.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Stub gateway listening on {}", addr);
    info!("Objects directory: {}", objects_root.display());
    info!("Endpoints:");
    info!("  GET  /health                   - Health check");
    info!("  POST /v1/stubs                 - Get or create a stub");
    info!("  POST /v1/stubs/{{stub_id}}/deploy - Deploy a stub");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stub gateway stopped");
    Ok(())
}

async fn agent(config: Config) -> anyhow::Result<()> {
    let agent_config = &config.agent;
    let node_name = agent_config.effective_node_name();

    let probe: Arc<dyn BackendProbe> = match agent_config.backend_url {
        Some(ref url) => {
            info!("Probing backend at {}", url);
            Arc::new(HttpBackendProbe::new(url, agent_config.ping_timeout())?)
        }
        None => {
            warn!("No backend_url configured, node will always report ready");
            Arc::new(NoopProbe)
        }
    };

    let bridge_config = BridgeConfig::new(node_name.clone())
        .with_interval(agent_config.status_interval())
        .with_thresholds(agent_config.thresholds());

    let provider = RemoteProvider::new(
        bridge_config,
        probe,
        Box::new(SystemPressureSampler::new()),
        Arc::new(InMemoryPodStore::new()),
    );

    if let Err(e) = provider.ping().await {
        warn!("Initial backend ping failed: {}", e);
    }

    provider.notify_node_status(Box::new(|snapshot: NodeStatusSnapshot| {
        info!(
            "Node status: node={}, ready={}",
            snapshot.node_name,
            snapshot.is_ready()
        );
        debug!("{}", format_node_status(&snapshot));
    }))?;

    info!(
        "Agent running for node {} (interval {}s)",
        node_name, agent_config.status_interval_secs
    );

    shutdown_signal().await;
    provider.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

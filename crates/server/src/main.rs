use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trailforge_core::{
    load_config, validate_config, DownloadCoordinator, Geocoder, JobQueue, LocalJobQueue,
    MapToolchain, NominatimClient, OrchestratorConfig, OverpassClient, PipelineOrchestrator,
    TileFetcher, WorkerPool,
};

use trailforge_server::api::create_router;
use trailforge_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("TrailForge {}", VERSION);

    // Determine config path
    let config_path = std::env::var("TRAILFORGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Job data directory: {:?}", config.storage.data_dir);
    info!(
        "Area limits: {} - {} deg², tiles of at most {} deg²",
        config.limits.min_bbox_area_deg2,
        config.limits.max_bbox_area_deg2,
        config.overpass.tile_area_deg2
    );

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.storage.data_dir))?;

    // Upstream clients
    let overpass =
        OverpassClient::new(&config.overpass).context("Failed to create Overpass client")?;
    info!("Using Overpass API at {}", config.overpass.url);
    let geocoder: Arc<dyn Geocoder> = Arc::new(
        NominatimClient::new(&config.geocoder).context("Failed to create geocoder client")?,
    );

    // Map tools
    let toolchain = Arc::new(MapToolchain::from_config(&config.tools));
    info!(
        "Map tools: osmium={:?}, splitter={:?}, mkgmap={:?}",
        config.tools.osmium_path, config.tools.splitter_jar, config.tools.mkgmap_jar
    );

    // Job queue and workers
    let (queue, receiver) = LocalJobQueue::new();
    let queue: Arc<dyn JobQueue> = Arc::new(queue);

    let fetcher = TileFetcher::from_config(Arc::new(overpass), &config.overpass);
    let coordinator = Arc::new(DownloadCoordinator::new(
        fetcher,
        Arc::clone(&toolchain),
        &config.overpass,
    ));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        coordinator,
        toolchain,
        Arc::clone(&queue),
        OrchestratorConfig::from_config(&config),
    ));
    let workers = WorkerPool::new(orchestrator, config.jobs.max_concurrent_jobs).spawn(receiver);
    info!(
        "Worker pool started ({} concurrent jobs, hard limit {}s)",
        config.jobs.max_concurrent_jobs, config.jobs.hard_time_limit_secs
    );

    // Create app state
    let state = Arc::new(AppState::new(&config, queue, geocoder));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Jobs still running are abandoned; their tool processes are killed on drop.
    info!("Server shutting down...");
    workers.abort();
    let _ = workers.await;
    info!("Worker pool stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

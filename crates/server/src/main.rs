use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dorama_core::{
    candidates, create_authenticator, load_config, validate_config, Authenticator, CacheConfig,
    CandidateSource, DoramaController, Harvester, KeyValueStore, SanitizedConfig, SeriesCatalog,
    SqliteKeyValueStore, TmdbClient, TwoTierCache,
};

use dorama_server::api::{create_router, forward_progress, WsBroadcaster};
use dorama_server::state::AppState;

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

    // Determine config path
    let config_path = std::env::var("DORAMA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Storage path: {:?}", config.storage.path);

    let config_json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(config_hash = &config_hash[..16], "Configuration fingerprint");

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Persistent cache tier
    let store: Arc<dyn KeyValueStore> = Arc::new(
        SqliteKeyValueStore::new(&config.storage.path, config.storage.quota())
            .context("Failed to open cache storage")?,
    );
    let cache = Arc::new(TwoTierCache::new(CacheConfig::from(&config.harvest), store));
    info!("Cache storage initialized");

    let tmdb: Arc<dyn SeriesCatalog> =
        Arc::new(TmdbClient::new(config.tmdb.clone()).context("Failed to create TMDB client")?);
    info!("TMDB client initialized");

    let candidate_source: Arc<dyn CandidateSource> =
        Arc::from(candidates::from_config(&config.harvest));

    let controller = DoramaController::new(
        Arc::new(Harvester::new(tmdb)),
        cache,
        candidate_source,
        &config.harvest,
    );

    // Relay harvest progress to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    tokio::spawn(forward_progress(
        controller.subscribe(),
        ws_broadcaster.clone(),
    ));
    info!("WebSocket broadcaster initialized");

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        controller.clone(),
        ws_broadcaster,
    ));

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

    info!("Server shutting down...");
    controller.shutdown().await;
    info!("Harvest stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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

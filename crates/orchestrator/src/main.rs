//! Deployment Orchestrator
//!
//! REST API for registering blockchain deployments and driving their
//! build/deploy/terminate jobs on the CI server

use anyhow::{Context, Result};
use ci_gateway::{DroneEndpoints, HttpGateway};
use deploy_orchestrator::{
    create_router, AppState, Config, MemoryStore, Orchestrator, ParameterEncoder, RedisStore,
    Store, StoreBackend,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deploy_orchestrator=debug,ci_gateway=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Deployment Orchestrator");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded: {:?}", config);

    // Initialize storage
    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Redis => Arc::new(
            RedisStore::new(&config.redis_url)
                .await
                .context("Failed to initialize storage")?,
        ),
        StoreBackend::Memory => {
            warn!("Using in-memory storage, state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // CI gateway
    let gateway = HttpGateway::new(config.drone_token.clone(), config.drone_timeout())
        .context("Failed to build CI client")?;
    let endpoints = DroneEndpoints::new(
        config.drone_server.clone(),
        config.drone_org.clone(),
        config.drone_repo.clone(),
        config.drone_branch.clone(),
    );
    info!(
        "CI server: {} ({}/{}, branch {})",
        config.drone_server,
        config.drone_org,
        config.drone_repo,
        endpoints.branch()
    );

    // Create application state
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(gateway),
        endpoints,
        ParameterEncoder::new(config.bucket_prefix.clone()),
    );
    let state = AppState {
        store,
        orchestrator,
    };

    // Create router
    let app = create_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Deployment Orchestrator running on http://{}", config.api_address());

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

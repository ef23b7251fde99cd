// Main entry point for API server

use anyhow::{Context, Result};
use job_sources::{JobSource, SqliteStore};
use server_core::{
    kernel::{build_registry, start_scheduler},
    server::{build_app, AppState},
    Config,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_sources=debug,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Job Aggregator API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database (schema is created on connect)
    tracing::info!("Connecting to database...");
    let store = SqliteStore::new(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Concrete adapters plug in here; none ship with the server yet
    let adapters: Vec<Arc<dyn JobSource>> = Vec::new();
    let registry = build_registry(&config, adapters);
    if registry.is_empty() {
        tracing::warn!("No job sources registered; searches will return no listings");
    } else {
        tracing::info!(sources = ?registry.names(), "Job sources registered");
    }

    let state = AppState::new(store, registry, config.clone());

    // Start scheduled tasks; keep the handle alive for the server's lifetime
    let _scheduler = start_scheduler(state.store.clone(), &config.saved_search_schedule)
        .await
        .context("Failed to start scheduled tasks")?;

    // Build application
    let app = build_app(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/api/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

// Main entry point for the site analysis API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::{AnthropicClient, FirecrawlClient, InMemoryResultStore, ServerDeps};
use server_core::server::build_app;
use server_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,ratchet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Site Analysis API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Build providers
    let scraper =
        FirecrawlClient::new(config.firecrawl_api_key).context("Failed to create Firecrawl client")?;
    let summarizer = AnthropicClient::new(config.anthropic_api_key, config.anthropic_model)
        .context("Failed to create Anthropic client")?;

    let deps = Arc::new(ServerDeps::new(
        Arc::new(scraper),
        Arc::new(summarizer),
        Arc::new(InMemoryResultStore::new()),
    ));

    // Build application
    let (app, engine) = build_app(deps);

    // Resume anything the journal reports as incomplete (a no-op for a
    // fresh in-memory journal; a durable backend hands back interrupted
    // workflows here)
    engine
        .recover_all()
        .await
        .context("Failed to recover workflows")?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

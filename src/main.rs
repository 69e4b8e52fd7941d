use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use linkcrush::auth::AuthService;
use linkcrush::config::{AuthMode, Config};
use linkcrush::{api, redirect, storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage = storage::connect(&config.database).await?;

    info!("Initializing storage...");
    storage
        .init()
        .await
        .context("failed to initialize storage")?;
    info!("Storage initialized successfully");

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(&config.auth)?);

    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - all API requests are allowed");
        }
        AuthMode::Jwt => {
            info!("🔐 JWT authentication enabled (HS256)");
        }
    }

    info!(
        "Short codes: {} characters, up to {} allocation attempts",
        config.shortener.code_length, config.shortener.max_attempts
    );

    // Create routers
    let api_router = api::create_api_router(
        Arc::clone(&storage),
        auth_service,
        config.shortener.clone(),
        &config.cors,
    );
    let redirect_router = redirect::create_redirect_router(Arc::clone(&storage));

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {api_addr}"))?;
    info!("🚀 API server listening on http://{}", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr)
        .await
        .with_context(|| format!("failed to bind redirect listener on {redirect_addr}"))?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);
    info!("   - Short links resolve as {}", config.shortener.short_url("{code}"));

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router).into_future(),
        axum::serve(redirect_listener, redirect_router).into_future(),
    )?;

    Ok(())
}

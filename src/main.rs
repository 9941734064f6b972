use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use socialconnect::auth::cleanup::{run_cleanup_worker, CleanupConfig};
use socialconnect::config::Config;
use socialconnect::db::Database;
use socialconnect::web::{self, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting socialconnect");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        database = %config.database_path.display(),
        media_dir = %config.media_dir.display(),
        "Configuration loaded"
    );
    if config.google_maps_api_key.is_none() {
        warn!("GOOGLE_MAPS_API_KEY not set - geocoding requests will fail");
    }

    // Ensure data directories exist
    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create media directory: {}",
                config.media_dir.display()
            )
        })?;

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    let shutdown = CancellationToken::new();

    let cleanup_handle = tokio::spawn(run_cleanup_worker(
        db.pool().clone(),
        CleanupConfig {
            interval: config.blacklist_cleanup_interval,
        },
        shutdown.clone(),
    ));

    let state = AppState::new(config, db).context("Failed to build application state")?;
    let web_shutdown = shutdown.clone();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(state, web_shutdown).await {
            error!("Web server error: {e:#}");
        }
    });

    shutdown_signal().await;

    info!("Shutting down...");
    shutdown.cancel();

    if let Err(e) = web_handle.await {
        warn!("Web server task ended abnormally: {e}");
    }
    if let Err(e) = cleanup_handle.await {
        warn!("Cleanup task ended abnormally: {e}");
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,socialconnect=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

//! Background cleanup worker for the token blacklist.

use sqlx::SqlitePool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cleanup configuration.
pub struct CleanupConfig {
    /// Interval between cleanup runs.
    pub interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Run a single cleanup cycle.
pub async fn cleanup_once(pool: &SqlitePool) {
    match crate::db::delete_expired_blacklist_entries(pool).await {
        Ok(count) => {
            if count > 0 {
                tracing::info!(expired_tokens = count, "Cleaned up token blacklist");
            }
        }
        Err(e) => {
            tracing::error!("Failed to clean up token blacklist: {e:#}");
        }
    }
}

/// Run the cleanup worker.
/// This task runs cleanup immediately on start, then at the configured interval.
/// It respects the cancellation token for graceful shutdown.
pub async fn run_cleanup_worker(
    pool: SqlitePool,
    config: CleanupConfig,
    shutdown: CancellationToken,
) {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Starting token blacklist cleanup worker"
    );

    cleanup_once(&pool).await;

    let mut interval = tokio::time::interval(config.interval);
    interval.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = interval.tick() => {
                cleanup_once(&pool).await;
            }
            () = shutdown.cancelled() => {
                tracing::info!("Cleanup worker shutting down");
                break;
            }
        }
    }
}

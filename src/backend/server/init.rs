/**
 * Server Initialization
 *
 * Turns a loaded `AppConfig` and an open pool into a ready-to-serve
 * router plus the background tasks that run alongside it.
 *
 * # Initialization Process
 *
 * 1. Create the upload directory
 * 2. Build `AppState`, which starts the hub loop
 * 3. Start the rate-limit cleanup task
 * 4. Assemble the router
 *
 * The caller owns the returned `App`: it serves `router`, and on shutdown
 * calls `hub.shutdown()` and awaits `hub_task`.
 */

use std::io;
use std::time::Duration;

use axum::Router;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::backend::middleware::rate_limit::RateLimiter;
use crate::backend::realtime::hub::Hub;
use crate::backend::routes::router::create_router;
use crate::backend::server::state::AppState;
use crate::shared::AppConfig;

/// Everything `main` needs to run and later stop the server
pub struct App {
    pub router: Router,
    pub state: AppState,
    pub hub_task: JoinHandle<()>,
    pub cleanup_task: JoinHandle<()>,
}

impl App {
    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Stop the hub and the background tasks.
    pub async fn shutdown(self) {
        self.cleanup_task.abort();
        self.state.hub.shutdown().await;
        if let Err(e) = self.hub_task.await {
            tracing::warn!("[Server] hub task ended abnormally: {}", e);
        }
        self.state.db_pool.close().await;
        tracing::info!("[Server] shutdown complete");
    }
}

/// Create and configure the application.
///
/// # Errors
///
/// Fails only when the upload directory cannot be created.
pub async fn create_app(config: AppConfig, db_pool: SqlitePool) -> io::Result<App> {
    tracing::info!("[Server] initializing agora");

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!("[Server] storing uploads in {}", config.upload_dir.display());

    let (state, hub_task) = AppState::new(config, db_pool);
    tracing::info!("[Server] hub started");

    let cleanup_task = spawn_rate_limit_cleanup(state.rate_limiter.clone());
    let router = create_router(state.clone());

    tracing::info!("[Server] router configured");

    Ok(App {
        router,
        state,
        hub_task,
        cleanup_task,
    })
}

/// Prune idle rate-limit buckets once per window.
pub fn spawn_rate_limit_cleanup(limiter: RateLimiter) -> JoinHandle<()> {
    let period = limiter.window().max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.purge_stale().await;
            if removed > 0 {
                tracing::debug!(
                    "[RateLimit] pruned {} idle buckets, {} remain",
                    removed,
                    limiter.tracked_clients().await
                );
            }
        }
    })
}

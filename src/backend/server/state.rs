/**
 * Application State Management
 *
 * `AppState` is the single state container handed to the router. Every
 * field is cheap to clone (pool handles, `Arc`, channel senders), and the
 * `FromRef` impls let handlers and middleware extract only the part they
 * need, e.g. `State(limiter): State<RateLimiter>`.
 *
 * ```rust,no_run
 * use agora::backend::server::state::AppState;
 * use axum::extract::State;
 *
 * async fn handler(State(state): State<AppState>) {
 *     let online = state.hub.online_users().await;
 *     // ...
 * }
 * ```
 */

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::backend::messaging::images::ImageStore;
use crate::backend::middleware::rate_limit::RateLimiter;
use crate::backend::realtime::hub::Hub;
use crate::shared::AppConfig;

/// Application state shared by every request handler
#[derive(Clone, Debug)]
pub struct AppState {
    /// Immutable after startup
    pub config: Arc<AppConfig>,

    /// SQLite connection pool
    pub db_pool: SqlitePool,

    /// Handle to the realtime hub loop
    pub hub: Hub,

    /// Where message images are validated and written
    pub images: ImageStore,

    /// Per-client request budget
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Build the state and start the hub loop.
    ///
    /// The returned handle completes once the hub has been shut down.
    pub fn new(config: AppConfig, db_pool: SqlitePool) -> (Self, JoinHandle<()>) {
        let (hub, hub_task) = Hub::start(config.realtime.hub_capacity);
        let images = ImageStore::from_config(&config);
        let rate_limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);

        let state = Self {
            config: Arc::new(config),
            db_pool,
            hub,
            images,
            rate_limiter,
        };
        (state, hub_task)
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Hub {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_limiter.clone()
    }
}

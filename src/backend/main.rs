/**
 * Agora Server Entry Point
 *
 * Loads configuration, opens the database, and serves the API and the
 * `/ws` endpoint until Ctrl-C or SIGTERM.
 */

use std::net::SocketAddr;

use agora::backend::server::{config::load_database, init::create_app};
use agora::shared::AppConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "agora=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = AppConfig::load()?;
    tracing::info!("[Server] configuration loaded");

    let pool = load_database(&config).await?;
    let bind_address = config.bind_address();
    let app = create_app(config, pool).await?;

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("[Server] listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("[Server] stopping");
    app.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[Server] failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("[Server] failed to listen for SIGTERM: {}", e);
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

    tracing::info!("[Server] shutdown signal received");
}

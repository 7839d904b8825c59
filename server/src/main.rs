//! Livesync Server binary.

use std::sync::Arc;

use livesync_server::config::Config;
use livesync_server::db::{self, PgChangeFeed, PgSource};
use livesync_server::sync::{Collaborators, Coordinator};
use livesync_server::websocket::ConnectionManager;
use livesync_server::{build_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livesync_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Livesync Server on {}:{}", config.host, config.port);

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    db::track_tables(&pool, &config.resources, &config.channel).await?;

    // Wire the synchronizers to Postgres
    let source = Arc::new(PgSource::new(pool.clone()));
    let feed = Arc::new(PgChangeFeed::connect(&pool, &config.channel).await?);
    let conn_manager = ConnectionManager::new_shared();

    let mut coordinator = Coordinator::new(Collaborators {
        fetch: source.clone(),
        feed,
        mutator: source,
    });
    coordinator.add_observer(conn_manager.clone());
    let coordinator = Arc::new(coordinator);
    coordinator.start_all(config.resources.clone())?;

    // Build application state
    let state = AppState {
        config: Arc::new(config.clone()),
        coordinator: coordinator.clone(),
        conn_manager,
    };
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.stop_all().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

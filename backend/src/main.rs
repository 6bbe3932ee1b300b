//! Wildlife Prediction Service - Backend Server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wps_server::external::{OpenWeatherClient, WeatherProvider};
use wps_server::services::{InMemoryPredictionStore, PgPredictionStore, PredictionStore};
use wps_server::{create_app, AppState, Config, Engine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wps_server=debug,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Wildlife Prediction Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn PredictionStore> = match &config.database.url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(url)
                .await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            Arc::new(PgPredictionStore::new(db_pool))
        }
        None => {
            tracing::warn!("No database configured, predictions are kept in memory");
            Arc::new(InMemoryPredictionStore::new())
        }
    };

    let provider: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherClient::new(
        config.weather.api_key.clone(),
        config.weather.api_endpoint.clone(),
        config.weather.timeout(),
    )?);

    let engine = Arc::new(Engine::from_config(&config, provider, store)?);
    engine.start().await?;

    let state = AppState {
        engine: engine.clone(),
        config: Arc::new(config.clone()),
    };
    let app = create_app(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

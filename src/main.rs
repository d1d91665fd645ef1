#![allow(dead_code)]

mod chart;
mod config;
mod errors;
mod handlers;
mod ml;
mod models;
mod pipeline;
mod sources;

use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::ml::{Booster, FeatureSchema, Predictor};
use crate::sources::RemoteSources;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "dengue_forecast=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(
        horizon_weeks = config.forecast.horizon_weeks,
        rolling_windows = ?config.forecast.rolling_windows,
        max_lag = config.forecast.max_lag,
        "Configuration loaded"
    );

    // Load model
    let booster = Booster::load(&config.model.path)?;
    match booster.feature_names() {
        Some(names) => {
            let schema = FeatureSchema::from_names(&config.forecast.target, names.iter().cloned())?;
            tracing::info!(
                path = %config.model.path,
                trees = booster.num_trees(),
                features = schema.len(),
                schema_version = schema.version,
                "Model loaded"
            );
        }
        None => tracing::warn!(
            path = %config.model.path,
            trees = booster.num_trees(),
            features = booster.num_features(),
            "Model has no recorded feature names; schema will follow the feature table"
        ),
    }

    let sources = RemoteSources::new(config.weather.clone(), config.cases.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        model: Arc::new(booster),
        sources: Arc::new(sources),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Starting dengue forecast server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

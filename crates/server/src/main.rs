mod adapters;
mod api;
mod bootstrap;
mod dashboard;
mod health;
mod report;
mod state;
mod whatsapp;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use opsdesk_core::config::{AppConfig, LoadOptions};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use opsdesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(event_name = "system.server.cors_origin_invalid", origin = %origin, "ignoring invalid cors origin");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(allowed)).allow_methods(Any).allow_headers(Any)
}

fn app(application: &bootstrap::Application) -> Router {
    Router::new()
        .nest("/api", api::router())
        .nest("/whatsapp", whatsapp::router())
        .merge(dashboard::router())
        .with_state(application.state.clone())
        .merge(health::router(application.db_pool.clone()))
        .layer(cors_layer(&application.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let application = bootstrap::bootstrap_with_config(config).await?;
    let address = application.config.listen_address();
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("failed to bind {address}"))?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        whatsapp_enabled = application.config.whatsapp.enabled,
        "opsdesk server listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, app(&application)).with_graceful_shutdown(async move {
        let _ = stop_rx.wait_for(|stopping| *stopping).await;
    });
    let mut serving = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut serving => {
            result.context("server task panicked")?.context("server stopped unexpectedly")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal.context("failed to listen for shutdown signal")?,
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "draining connections");
    let _ = stop_tx.send(true);

    let grace = Duration::from_secs(application.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, serving).await {
        Ok(joined) => joined.context("server task panicked")?.context("server shutdown failed")?,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "connections still open after grace period"
        ),
    }

    application.db_pool.close().await;
    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "opsdesk server stopped");
    Ok(())
}

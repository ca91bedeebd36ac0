//! wsync-daemon entry point.
//!
//! Thin: loads config, sets up tracing, builds the shared state, wires
//! middleware, and starts the HTTP server. Route handlers live in
//! `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use wsync_config::{load_layered_yaml, paths_from_env, SyncConfig};
use wsync_daemon::{routes, state};
use wsync_runtime::{HttpQueryClient, PollSettings, PriceFeedSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_config()?;

    let client = Arc::new(HttpQueryClient::new_with_base_url(cfg.node_api.base_url.clone()));
    let poll = PollSettings {
        balances_interval: cfg.polling.balances_interval(),
        quotes_interval: cfg.polling.quotes_interval(),
    };
    let prices = cfg.prices.active_provider().map(|url| PriceFeedSettings {
        provider_url: url.to_string(),
        currency: cfg.prices.currency.clone(),
        refresh_interval: cfg.prices.refresh_interval(),
        max_backoff: cfg.prices.max_backoff(),
        stale_after: cfg.prices.stale_after(),
    });
    if prices.is_none() {
        info!("price feed disabled");
    }

    let shared = Arc::new(state::AppState::new(client, poll, prices));
    shared.start().await;
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(addr) => addr,
        None => cfg.daemon.socket_addr()?,
    };
    info!("wsync-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server crashed")?;

    shared.engine.shutdown();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layered config from `WSYNC_CONFIG`; defaults when unset.
fn load_config() -> anyhow::Result<SyncConfig> {
    let paths = paths_from_env();
    if paths.is_empty() {
        info!("WSYNC_CONFIG not set; using built-in defaults");
        return Ok(SyncConfig::default());
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    loaded.sync_config()
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("WSYNC_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
        "http://localhost:1420",
        "http://127.0.0.1:1420",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

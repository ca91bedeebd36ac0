use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use wsync_config::{load_layered_yaml, SyncConfig};
use wsync_reconcile::{total_in_display_currency, BalancesMap, PendingQuotesMap};
use wsync_runtime::{
    error_chain, held_assets, ErrorSink, HttpQueryClient, PriceFeed, PriceFeedSettings,
    RemoteQueryClient, StateStore, SyncError, TracingSink,
};
use wsync_schemas::{Amount, NodeId, Unit};

#[derive(Parser)]
#[command(name = "wsync")]
#[command(about = "Wallet state sync CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Fetch balances and pending quotes once and print the reconciled state
    Poll {
        /// Layered config paths in merge order. Built-in defaults when omitted.
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Node API base URL; overrides `node_api.base_url`.
        #[arg(long)]
        node_url: Option<String>,

        /// Skip the price lookup even when a provider is configured.
        #[arg(long, default_value_t = false)]
        no_prices: bool,
    },
}

#[derive(Debug, Serialize)]
struct PollReport {
    balances: BalancesMap,
    pending_quotes: PendingQuotesMap,
    per_unit: BTreeMap<Unit, Amount>,
    nodes_with_pending_quotes: Vec<NodeId>,
    currency: Option<String>,
    display_total: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Poll {
            config_paths,
            node_url,
            no_prices,
        } => {
            let cfg = load_config(&config_paths)?;
            let report = poll_once(&cfg, node_url, no_prices).await?;
            let out = serde_json::to_string_pretty(&report).context("serialize poll report")?;
            println!("{out}");
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn load_config(paths: &[String]) -> Result<SyncConfig> {
    if paths.is_empty() {
        return Ok(SyncConfig::default());
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;
    info!(config_hash = %loaded.config_hash, "config loaded");
    loaded.sync_config()
}

async fn poll_once(
    cfg: &SyncConfig,
    node_url: Option<String>,
    no_prices: bool,
) -> Result<PollReport> {
    let base_url = node_url.unwrap_or_else(|| cfg.node_api.base_url.clone());
    let client = HttpQueryClient::new_with_base_url(base_url);
    let sink: Arc<dyn ErrorSink> = Arc::new(TracingSink);
    let store = StateStore::new(Arc::clone(&sink));

    let (nodes, groups) = tokio::join!(client.fetch_node_balances(), client.fetch_pending_quotes());
    store.apply_full_balances(nodes.map_err(SyncError::Balances)?);
    store.apply_full_quotes(groups.map_err(SyncError::Quotes)?);

    let per_unit = store.total_balance_per_unit();

    let mut currency = None;
    let mut display_total = None;
    if let Some(url) = cfg.prices.active_provider().filter(|_| !no_prices) {
        let feed = PriceFeed::new(
            PriceFeedSettings {
                provider_url: url.to_string(),
                currency: cfg.prices.currency.clone(),
                refresh_interval: cfg.prices.refresh_interval(),
                max_backoff: cfg.prices.max_backoff(),
                stale_after: cfg.prices.stale_after(),
            },
            sink,
        );
        // a price failure still leaves the balances worth printing
        if let Err(err) = feed.refresh_once(&held_assets(&per_unit)).await {
            warn!(error = %error_chain(&err), "price lookup failed");
        }
        let state = feed.current();
        display_total = state
            .prices
            .as_deref()
            .map(|prices| total_in_display_currency(&per_unit, prices));
        currency = Some(state.currency);
    }

    Ok(PollReport {
        balances: BalancesMap::clone(&store.balances()),
        pending_quotes: PendingQuotesMap::clone(&store.pending_quotes()),
        nodes_with_pending_quotes: store.nodes_with_pending_quotes().into_iter().collect(),
        per_unit,
        currency,
        display_total,
    })
}

//! Display-currency price feed.
//!
//! Loop: fetch prices for the assets currently held; on success wait the
//! refresh interval, on failure back off exponentially (1s doubling, capped).
//! Once the last successful sync is older than `stale_after`, published
//! prices drop to `None` so no display total is computed on stale data.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wsync_schemas::{Amount, Price, Unit};

use crate::error::{error_chain, QueryError, SyncError};
use crate::sink::ErrorSink;
use crate::store::StateStore;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PriceFeedSettings {
    pub provider_url: String,
    pub currency: String,
    pub refresh_interval: Duration,
    pub max_backoff: Duration,
    pub stale_after: Duration,
}

impl PriceFeedSettings {
    pub fn new(provider_url: impl Into<String>) -> Self {
        Self {
            provider_url: provider_url.into(),
            currency: "usd".to_string(),
            refresh_interval: Duration::from_secs(10),
            max_backoff: Duration::from_secs(60),
            stale_after: Duration::from_secs(60),
        }
    }
}

/// Published price view. `prices == None` means out of sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceState {
    pub prices: Option<Vec<Price>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub currency: String,
}

// Provider wire format.
#[derive(Debug, Deserialize)]
struct PricesResponse {
    prices: Vec<TokenPrice>,
}

#[derive(Debug, Deserialize)]
struct TokenPrice {
    symbol: String,
    price: Vec<CurrencyValue>,
}

#[derive(Debug, Deserialize)]
struct CurrencyValue {
    currency: String,
    value: f64,
}

/// Value in `currency`, else the first listed value.
fn pick_value(values: &[CurrencyValue], currency: &str) -> Option<f64> {
    values
        .iter()
        .find(|v| v.currency.eq_ignore_ascii_case(currency))
        .or_else(|| values.first())
        .map(|v| v.value)
}

/// Asset symbols of the units with a non-zero total. Sorted, deduplicated.
pub fn held_assets(totals: &BTreeMap<Unit, Amount>) -> Vec<&'static str> {
    totals
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .filter_map(|(unit, _)| unit.asset_symbol())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct PriceFeed {
    http: reqwest::Client,
    settings: PriceFeedSettings,
    state: watch::Sender<PriceState>,
    sink: Arc<dyn ErrorSink>,
}

impl PriceFeed {
    pub fn new(settings: PriceFeedSettings, sink: Arc<dyn ErrorSink>) -> Self {
        let (state, _) = watch::channel(PriceState {
            prices: None,
            last_sync: None,
            currency: settings.currency.clone(),
        });
        Self {
            http: reqwest::Client::new(),
            settings,
            state,
            sink,
        }
    }

    pub fn current(&self) -> PriceState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PriceState> {
        self.state.subscribe()
    }

    /// One provider round trip.
    pub async fn fetch(&self, assets: &[&str]) -> Result<Vec<Price>, QueryError> {
        let url = format!("{}/prices", self.settings.provider_url.trim_end_matches('/'));
        let assets = assets.join(",");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("currencies", self.settings.currency.as_str()),
                ("assets", assets.as_str()),
            ])
            .send()
            .await
            .map_err(|source| QueryError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body: PricesResponse = resp
            .json()
            .await
            .map_err(|source| QueryError::Decode { url, source })?;

        Ok(body
            .prices
            .into_iter()
            .filter_map(|t| {
                let value = pick_value(&t.price, &self.settings.currency)?;
                Some(Price::new(t.symbol, value))
            })
            .collect())
    }

    /// Fetch and publish. Nothing held means nothing to price: an empty list
    /// is published without a request.
    pub async fn refresh_once(&self, assets: &[&str]) -> Result<(), SyncError> {
        let prices = if assets.is_empty() {
            Vec::new()
        } else {
            self.fetch(assets).await.map_err(SyncError::Prices)?
        };
        debug!(count = prices.len(), "prices refreshed");
        self.state.send_modify(|s| {
            s.prices = Some(prices);
            s.last_sync = Some(Utc::now());
        });
        Ok(())
    }

    /// Drop published prices if the last sync is older than `stale_after`.
    /// Returns true only on the transition into the out-of-sync state.
    pub fn mark_stale_if_needed(&self, now: DateTime<Utc>) -> bool {
        let stale_after = self.settings.stale_after;
        self.state.send_if_modified(|s| {
            let expired = s.last_sync.is_some_and(|at| {
                now.signed_duration_since(at)
                    .to_std()
                    .is_ok_and(|age| age > stale_after)
            });
            if expired && s.prices.is_some() {
                s.prices = None;
                true
            } else {
                false
            }
        })
    }

    /// Run the refresh loop against the assets held in `store`.
    pub fn spawn(self: Arc<Self>, store: Arc<StateStore>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            info!(currency = %self.settings.currency, "price feed started");
            loop {
                let totals = store.total_balance_per_unit();
                let assets = held_assets(&totals);
                let delay = match self.refresh_once(&assets).await {
                    Ok(()) => {
                        backoff = INITIAL_BACKOFF;
                        self.settings.refresh_interval
                    }
                    Err(err) => {
                        warn!(
                            error = %error_chain(&err),
                            retry_in_ms = backoff.as_millis() as u64,
                            "price refresh failed"
                        );
                        if self.mark_stale_if_needed(Utc::now()) {
                            self.sink.report("prices out of sync", &err);
                        }
                        let delay = backoff;
                        backoff = (backoff * 2).min(self.settings.max_backoff);
                        delay
                    }
                };
                tokio::time::sleep(delay).await;
            }
        })
    }
}

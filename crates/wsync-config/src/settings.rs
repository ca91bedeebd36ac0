//! Typed view of the merged config. Every key has a default, so an empty
//! document is a valid config. Unknown keys are rejected.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub node_api: NodeApiConfig,
    pub polling: PollingConfig,
    pub prices: PricesConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeApiConfig {
    pub base_url: String,
}

impl Default for NodeApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3338".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    pub balances_interval_ms: u64,
    pub quotes_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            balances_interval_ms: 10_000,
            quotes_interval_ms: 10_000,
        }
    }
}

impl PollingConfig {
    pub fn balances_interval(&self) -> Duration {
        Duration::from_millis(self.balances_interval_ms)
    }

    pub fn quotes_interval(&self) -> Duration {
        Duration::from_millis(self.quotes_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricesConfig {
    pub enabled: bool,
    /// Price provider base URL. The feed stays off while unset.
    pub provider_url: Option<String>,
    pub currency: String,
    pub refresh_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub stale_after_ms: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_url: None,
            currency: "usd".to_string(),
            refresh_interval_ms: 10_000,
            max_backoff_ms: 60_000,
            stale_after_ms: 60_000,
        }
    }
}

impl PricesConfig {
    /// Provider URL if the feed should run.
    pub fn active_provider(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.provider_url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub bind_addr: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8899".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid daemon.bind_addr: {}", self.bind_addr))
    }
}

impl SyncConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: SyncConfig =
            serde_json::from_value(v.clone()).context("config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("polling.balances_interval_ms", self.polling.balances_interval_ms),
            ("polling.quotes_interval_ms", self.polling.quotes_interval_ms),
            ("prices.refresh_interval_ms", self.prices.refresh_interval_ms),
            ("prices.max_backoff_ms", self.prices.max_backoff_ms),
            ("prices.stale_after_ms", self.prices.stale_after_ms),
        ];
        for (key, ms) in intervals {
            if ms == 0 {
                bail!("CONFIG_INVALID {key} must be > 0");
            }
        }
        if self.node_api.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID node_api.base_url must not be empty");
        }
        if self.prices.currency.trim().is_empty() {
            bail!("CONFIG_INVALID prices.currency must not be empty");
        }
        self.daemon.socket_addr()?;
        Ok(())
    }
}

//! Shared runtime state for wsync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The sync engine owns
//! the authoritative store; this module only wires it to the SSE bus.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, warn};
use uuid::Uuid;
use wsync_reconcile::{BalancesMap, PendingQuotesMap, SoftFailure};
use wsync_runtime::{
    error_chain, ErrorSink, EventBus, PollSettings, PriceFeed, PriceFeedSettings, PriceState,
    RemoteQueryClient, SyncEngine,
};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Balances {
        nodes: BalancesMap,
    },
    PendingQuotes {
        quotes: PendingQuotesMap,
    },
    Prices {
        state: PriceState,
    },
    /// Something the user should see. `level` is "error" or "warn".
    Error {
        incident_id: Uuid,
        level: &'static str,
        message: String,
        cause: Option<String>,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Balances { .. } => "balances",
            BusMsg::PendingQuotes { .. } => "pending_quotes",
            BusMsg::Prices { .. } => "prices",
            BusMsg::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// BusSink
// ---------------------------------------------------------------------------

/// Error sink that logs and forwards to SSE subscribers.
pub struct BusSink {
    bus: broadcast::Sender<BusMsg>,
}

impl BusSink {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

impl ErrorSink for BusSink {
    fn report(&self, user_message: &str, cause: &(dyn StdError + Send + Sync + 'static)) {
        let incident_id = Uuid::new_v4();
        let cause = error_chain(cause);
        error!(%incident_id, cause = %cause, "{user_message}");
        let _ = self.bus.send(BusMsg::Error {
            incident_id,
            level: "error",
            message: user_message.to_string(),
            cause: Some(cause),
        });
    }

    fn soft_failure(&self, failure: &SoftFailure) {
        let incident_id = Uuid::new_v4();
        warn!(%incident_id, %failure, "soft failure during reconciliation");
        let _ = self.bus.send(BusMsg::Error {
            incident_id,
            level: "warn",
            message: failure.to_string(),
            cause: None,
        });
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: SyncEngine,
    /// Push channel for local producers (`POST /v1/notify`).
    pub events: EventBus,
    /// `None` when the price feed is disabled.
    pub prices: Option<Arc<PriceFeed>>,
}

impl AppState {
    pub fn new(
        client: Arc<dyn RemoteQueryClient>,
        poll: PollSettings,
        prices: Option<PriceFeedSettings>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let sink: Arc<dyn ErrorSink> = Arc::new(BusSink::new(bus.clone()));

        Self {
            engine: SyncEngine::new(client, Arc::clone(&sink), poll),
            prices: prices.map(|s| Arc::new(PriceFeed::new(s, Arc::clone(&sink)))),
            events: EventBus::default(),
            build: BuildInfo {
                service: "wsync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            bus,
        }
    }

    /// Start polling, the push listener, the price feed and the SSE forwarders.
    pub async fn start(self: &Arc<Self>) {
        spawn_state_forwarders(self);
        self.engine.start(&self.events).await;
        if let Some(feed) = &self.prices {
            Arc::clone(feed).spawn(Arc::clone(self.engine.store()));
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Forward every store and price change onto the SSE bus.
///
/// Each forwarder ends when its watch sender is dropped.
pub fn spawn_state_forwarders(state: &AppState) {
    let mut balances = state.engine.store().subscribe_balances();
    let bus = state.bus.clone();
    tokio::spawn(async move {
        while balances.changed().await.is_ok() {
            let nodes = BalancesMap::clone(&balances.borrow_and_update());
            let _ = bus.send(BusMsg::Balances { nodes });
        }
    });

    let mut quotes = state.engine.store().subscribe_pending_quotes();
    let bus = state.bus.clone();
    tokio::spawn(async move {
        while quotes.changed().await.is_ok() {
            let snapshot = PendingQuotesMap::clone(&quotes.borrow_and_update());
            let _ = bus.send(BusMsg::PendingQuotes { quotes: snapshot });
        }
    });

    if let Some(feed) = &state.prices {
        let mut prices = feed.subscribe();
        let bus = state.bus.clone();
        tokio::spawn(async move {
            while prices.changed().await.is_ok() {
                let state = prices.borrow_and_update().clone();
                let _ = bus.send(BusMsg::Prices { state });
            }
        });
    }
}

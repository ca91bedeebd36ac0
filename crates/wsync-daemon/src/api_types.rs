//! Response types for wsync-daemon HTTP endpoints.
//!
//! No business logic lives here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wsync_schemas::{Amount, NodeId, Unit};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub balances_polling: bool,
    pub quotes_polling: bool,
}

// ---------------------------------------------------------------------------
// /v1/totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TotalsResponse {
    pub per_unit: BTreeMap<Unit, Amount>,
    pub nodes_with_pending_quotes: Vec<NodeId>,
    /// Null while prices are disabled or out of sync.
    pub display_total: Option<f64>,
    pub currency: Option<String>,
    pub prices_last_sync: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// /v1/notify
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NotifyResponse {
    /// Subscribers the notification reached.
    pub delivered: usize,
}

// ---------------------------------------------------------------------------
// /v1/nodes/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RemoveNodeResponse {
    pub node_id: NodeId,
    pub removed: bool,
}

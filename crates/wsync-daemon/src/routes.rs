//! Axum router and all HTTP handlers for wsync-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use wsync_reconcile::total_in_display_currency;
use wsync_schemas::{NodeId, Notification};

use crate::{
    api_types::{HealthResponse, NotifyResponse, RemoveNodeResponse, TotalsResponse},
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/balances", get(balances))
        .route("/v1/pending-quotes", get(pending_quotes))
        .route("/v1/totals", get(totals))
        .route("/v1/poll", post(poll_now))
        .route("/v1/notify", post(notify))
        .route("/v1/nodes/:id", delete(remove_node))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            balances_polling: st.engine.balances_poller().is_running(),
            quotes_polling: st.engine.quotes_poller().is_running(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/balances, /v1/pending-quotes
// ---------------------------------------------------------------------------

pub(crate) async fn balances(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.engine.store().balances();
    (StatusCode::OK, Json(snap.as_ref().clone()))
}

pub(crate) async fn pending_quotes(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.engine.store().pending_quotes();
    (StatusCode::OK, Json(snap.as_ref().clone()))
}

// ---------------------------------------------------------------------------
// GET /v1/totals
// ---------------------------------------------------------------------------

pub(crate) async fn totals(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let store = st.engine.store();
    let per_unit = store.total_balance_per_unit();
    let nodes_with_pending_quotes = store.nodes_with_pending_quotes().into_iter().collect();

    let price_state = st.prices.as_ref().map(|feed| feed.current());
    let display_total = price_state
        .as_ref()
        .and_then(|p| p.prices.as_deref())
        .map(|prices| total_in_display_currency(&per_unit, prices));

    (
        StatusCode::OK,
        Json(TotalsResponse {
            per_unit,
            nodes_with_pending_quotes,
            display_total,
            currency: price_state.as_ref().map(|p| p.currency.clone()),
            prices_last_sync: price_state.and_then(|p| p.last_sync),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/poll
// ---------------------------------------------------------------------------

pub(crate) async fn poll_now(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let triggers = st.engine.trigger_immediate_poll();
    info!(?triggers, "poll requested");
    (StatusCode::OK, Json(triggers))
}

// ---------------------------------------------------------------------------
// POST /v1/notify
// ---------------------------------------------------------------------------

pub(crate) async fn notify(
    State(st): State<Arc<AppState>>,
    Json(notification): Json<Notification>,
) -> impl IntoResponse {
    let delivered = st.events.publish(notification);
    (StatusCode::ACCEPTED, Json(NotifyResponse { delivered }))
}

// ---------------------------------------------------------------------------
// DELETE /v1/nodes/:id
// ---------------------------------------------------------------------------

pub(crate) async fn remove_node(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Response {
    let node_id = NodeId(id);
    let removed = st.engine.store().remove_node(node_id);
    let status = if removed {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(RemoveNodeResponse { node_id, removed })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

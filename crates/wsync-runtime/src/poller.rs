//! Non-overlapping periodic refresh.
//!
//! One `Poller` per resource class. Invariants:
//! - at most one refresh in flight per poller, whether started by the
//!   interval or by [`Poller::trigger_immediate_poll`]
//! - a tick or trigger that finds a refresh in flight is dropped, not queued
//! - the in-flight flag is cleared by a drop guard, so a failing or panicking
//!   refresh cannot wedge the poller
//! - `stop` cancels future ticks only; an in-flight refresh runs to completion

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{error_chain, SyncError};
use crate::sink::ErrorSink;

/// Floor for the tick period; `tokio::time::interval` panics on zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), SyncError>> + Send + Sync>;

/// What a call to [`Poller::trigger_immediate_poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    NotRunning,
    InFlight,
}

struct Shared {
    name: &'static str,
    in_flight: AtomicBool,
    refresh: RefreshFn,
    sink: Arc<dyn ErrorSink>,
}

/// Clears the in-flight flag when the refresh task ends, however it ends.
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl Shared {
    /// Start a refresh unless one is already running.
    fn run_once(self: &Arc<Self>) -> TriggerOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(poller = self.name, "refresh already in flight; skipped");
            return TriggerOutcome::InFlight;
        }

        let guard = InFlightGuard(Arc::clone(self));
        let fut = (self.refresh)();
        tokio::spawn(async move {
            let shared = Arc::clone(&guard.0);
            let res = fut.await;
            drop(guard);
            if let Err(err) = res {
                error!(poller = shared.name, error = %error_chain(&err), "refresh failed");
                shared.sink.report(&err.to_string(), &err);
            }
        });
        TriggerOutcome::Started
    }
}

pub struct Poller {
    shared: Arc<Shared>,
    interval: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new<F, Fut>(
        name: &'static str,
        interval: Duration,
        sink: Arc<dyn ErrorSink>,
        refresh: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        let refresh: RefreshFn = Arc::new(move || refresh().boxed());
        let interval = if interval < MIN_INTERVAL {
            warn!(poller = name, ?interval, "poll interval below minimum; clamped");
            MIN_INTERVAL
        } else {
            interval
        };
        Self {
            shared: Arc::new(Shared {
                name,
                in_flight: AtomicBool::new(false),
                refresh,
                sink,
            }),
            interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a refresh now, then every `interval`. No-op if already running.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        *ticker = Some(tokio::spawn(async move {
            let mut tick = time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // first tick completes immediately
                tick.tick().await;
                shared.run_once();
            }
        }));
        info!(
            poller = self.shared.name,
            interval_ms = period.as_millis() as u64,
            "poller started"
        );
    }

    /// Cancel future ticks. Idempotent.
    pub fn stop(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(t) = ticker.take() {
            t.abort();
            info!(poller = self.shared.name, "poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Refresh now, out of band. The interval timer is not reset.
    pub fn trigger_immediate_poll(&self) -> TriggerOutcome {
        if !self.is_running() {
            return TriggerOutcome::NotRunning;
        }
        self.shared.run_once()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

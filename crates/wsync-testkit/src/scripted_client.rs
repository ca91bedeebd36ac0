use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use wsync_runtime::{QueryError, RemoteQueryClient};
use wsync_schemas::{NodeState, QuoteGroup};

/// Call accounting for one endpoint.
#[derive(Default)]
struct Endpoint {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    fail_next: AtomicUsize,
}

impl Endpoint {
    fn enter(&self) -> EndpointGuard<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        EndpointGuard(self)
    }

    /// Consume one injected failure, if any are left.
    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct EndpointGuard<'a>(&'a Endpoint);

impl Drop for EndpointGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory node API.
///
/// Returns whatever was last scripted, after `delay`. Injected failures are
/// consumed one per call, before the delay elapses.
#[derive(Default)]
pub struct ScriptedQueryClient {
    nodes: Mutex<Vec<NodeState>>,
    groups: Mutex<Vec<QuoteGroup>>,
    delay: Mutex<Duration>,
    balances: Endpoint,
    quotes: Endpoint,
}

impl ScriptedQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn set_balances(&self, nodes: Vec<NodeState>) {
        *self.nodes.lock().unwrap_or_else(PoisonError::into_inner) = nodes;
    }

    pub fn set_quotes(&self, groups: Vec<QuoteGroup>) {
        *self.groups.lock().unwrap_or_else(PoisonError::into_inner) = groups;
    }

    pub fn fail_next_balances(&self, times: usize) {
        self.balances.fail_next.store(times, Ordering::SeqCst);
    }

    pub fn fail_next_quotes(&self, times: usize) {
        self.quotes.fail_next.store(times, Ordering::SeqCst);
    }

    pub fn balances_calls(&self) -> usize {
        self.balances.calls.load(Ordering::SeqCst)
    }

    pub fn quotes_calls(&self) -> usize {
        self.quotes.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `fetch_node_balances` calls seen.
    pub fn max_concurrent_balances(&self) -> usize {
        self.balances.high_water.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_quotes(&self) -> usize {
        self.quotes.high_water.load(Ordering::SeqCst)
    }

    fn delay(&self) -> Duration {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl RemoteQueryClient for ScriptedQueryClient {
    async fn fetch_node_balances(&self) -> Result<Vec<NodeState>, QueryError> {
        let _guard = self.balances.enter();
        let fail = self.balances.take_failure();
        tokio::time::sleep(self.delay()).await;
        if fail {
            return Err(QueryError::Transient("scripted balances failure".into()));
        }
        Ok(self.nodes.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn fetch_pending_quotes(&self) -> Result<Vec<QuoteGroup>, QueryError> {
        let _guard = self.quotes.enter();
        let fail = self.quotes.take_failure();
        tokio::time::sleep(self.delay()).await;
        if fail {
            return Err(QueryError::Transient("scripted quotes failure".into()));
        }
        Ok(self.groups.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

//! Composition root: one store, two pollers, one push listener.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::client::RemoteQueryClient;
use crate::error::{error_chain, SyncError};
use crate::notify::{spawn_event_listener, ListenerHandle, NotificationChannel};
use crate::poller::{Poller, TriggerOutcome};
use crate::sink::ErrorSink;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub balances_interval: Duration,
    pub quotes_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            balances_interval: Duration::from_secs(10),
            quotes_interval: Duration::from_secs(10),
        }
    }
}

/// Outcome of an out-of-band refresh request, per poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollTriggers {
    pub balances: TriggerOutcome,
    pub quotes: TriggerOutcome,
}

pub struct SyncEngine {
    store: Arc<StateStore>,
    sink: Arc<dyn ErrorSink>,
    balances: Poller,
    quotes: Poller,
    listener: Mutex<Option<ListenerHandle>>,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn RemoteQueryClient>,
        sink: Arc<dyn ErrorSink>,
        settings: PollSettings,
    ) -> Self {
        let store = Arc::new(StateStore::new(Arc::clone(&sink)));

        let balances = {
            let client = Arc::clone(&client);
            let store = Arc::clone(&store);
            Poller::new(
                "balances",
                settings.balances_interval,
                Arc::clone(&sink),
                move || {
                    let client = Arc::clone(&client);
                    let store = Arc::clone(&store);
                    async move {
                        let nodes = client
                            .fetch_node_balances()
                            .await
                            .map_err(SyncError::Balances)?;
                        store.apply_full_balances(nodes);
                        Ok(())
                    }
                },
            )
        };

        let quotes = {
            let client = Arc::clone(&client);
            let store = Arc::clone(&store);
            Poller::new(
                "quotes",
                settings.quotes_interval,
                Arc::clone(&sink),
                move || {
                    let client = Arc::clone(&client);
                    let store = Arc::clone(&store);
                    async move {
                        let groups = client
                            .fetch_pending_quotes()
                            .await
                            .map_err(SyncError::Quotes)?;
                        store.apply_full_quotes(groups);
                        Ok(())
                    }
                },
            )
        };

        Self {
            store,
            sink,
            balances,
            quotes,
            listener: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn balances_poller(&self) -> &Poller {
        &self.balances
    }

    pub fn quotes_poller(&self) -> &Poller {
        &self.quotes
    }

    /// Subscribe to push events and start both pollers.
    ///
    /// A failed subscription is reported and polling starts anyway; the
    /// store then converges through full polls alone.
    pub async fn start(&self, channel: &dyn NotificationChannel) {
        let already_listening = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_closed());

        if !already_listening {
            match channel.subscribe().await {
                Ok(sub) => {
                    let handle = spawn_event_listener(Arc::clone(&self.store), sub);
                    *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                }
                Err(err) => {
                    error!(error = %error_chain(&err), "notification subscription failed");
                    self.sink.report("live updates unavailable", &err);
                }
            }
        }

        self.balances.start();
        self.quotes.start();
        info!("sync engine started");
    }

    /// Stop scheduling polls. In-flight polls still land; push events keep
    /// flowing until [`SyncEngine::shutdown`] or drop.
    pub fn stop(&self) {
        self.balances.stop();
        self.quotes.stop();
    }

    /// Stop polling and release the push subscription.
    pub fn shutdown(&self) {
        self.stop();
        if let Some(mut handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.close();
        }
        info!("sync engine shut down");
    }

    pub fn trigger_immediate_poll(&self) -> PollTriggers {
        PollTriggers {
            balances: self.balances.trigger_immediate_poll(),
            quotes: self.quotes.trigger_immediate_poll(),
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

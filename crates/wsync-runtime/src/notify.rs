//! Push channel: subscription, in-process bus, and the listener task that
//! feeds notifications into the store.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wsync_schemas::Notification;

use crate::error::QueryError;
use crate::store::StateStore;

/// Source of push notifications. Delivery is at-most-once and unordered
/// relative to polling.
#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn subscribe(&self) -> Result<Subscription, QueryError>;
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<Notification>) -> Self {
        Self { rx }
    }

    /// Next notification, or `None` once the channel is closed.
    ///
    /// A lagging subscriber loses the overflowed messages; that is logged
    /// and delivery resumes with the oldest retained one.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(n) => return Some(n),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notification subscriber lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process notification channel over `tokio::sync::broadcast`.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all current subscribers. Returns how many received it;
    /// with no subscribers the notification is dropped.
    pub fn publish(&self, notification: Notification) -> usize {
        match self.tx.send(notification) {
            Ok(n) => n,
            Err(_) => {
                debug!("notification published with no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait::async_trait]
impl NotificationChannel for EventBus {
    async fn subscribe(&self) -> Result<Subscription, QueryError> {
        Ok(Subscription::new(self.tx.subscribe()))
    }
}

/// Owns the listener task. Closing or dropping it stops event processing.
#[derive(Debug)]
pub struct ListenerHandle {
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("notification listener closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Apply every notification from `sub` to `store` until the channel closes
/// or the handle is closed.
pub fn spawn_event_listener(store: Arc<StateStore>, mut sub: Subscription) -> ListenerHandle {
    let task = tokio::spawn(async move {
        while let Some(notification) = sub.recv().await {
            let outcome = store.apply_notification(&notification);
            debug!(?notification, ?outcome, "notification applied");
        }
        info!("notification channel closed");
    });
    ListenerHandle { task: Some(task) }
}

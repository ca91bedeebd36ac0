//! wsync-runtime
//!
//! Owns the authoritative state store and everything that feeds it:
//! - [`StateStore`]: balances + pending quotes, snapshot reads, subscriptions
//! - [`Poller`]: non-overlapping periodic refresh with on-demand triggering
//! - [`RemoteQueryClient`] / [`HttpQueryClient`]: full-poll source
//! - [`NotificationChannel`] / [`EventBus`]: best-effort push source
//! - [`PriceFeed`]: display-currency prices with backoff and staleness
//! - [`SyncEngine`]: composition root wiring the above together
//!
//! Merge semantics live in `wsync-reconcile`; this crate only schedules and
//! serializes them.

pub mod client;
pub mod engine;
pub mod error;
pub mod notify;
pub mod poller;
pub mod prices;
pub mod sink;
pub mod store;

pub use client::{HttpQueryClient, RemoteQueryClient};
pub use engine::{PollSettings, PollTriggers, SyncEngine};
pub use error::{error_chain, QueryError, SyncError};
pub use notify::{spawn_event_listener, EventBus, ListenerHandle, NotificationChannel, Subscription};
pub use poller::{Poller, TriggerOutcome};
pub use prices::{held_assets, PriceFeed, PriceFeedSettings, PriceState};
pub use sink::{ErrorSink, TracingSink};
pub use store::{BalancesSnapshot, PendingQuotesSnapshot, StateStore};

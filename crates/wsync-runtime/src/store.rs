//! The authoritative state store.
//!
//! Two views, each held in a `watch` channel as an `Arc` snapshot:
//! - balances: `NodeId -> NodeState`
//! - pending quotes: `NodeId -> NodePendingQuotes`
//!
//! Every merge runs inside `send_if_modified`, which holds the channel's
//! write lock for the duration of the closure. Merges on one view are
//! therefore serialized, and readers only ever see a complete snapshot.
//! Subscribers wake only when a merge changed something.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use wsync_reconcile::{
    self as reconcile, BalancesDiff, BalancesMap, IgnoreReason, MergeOutcome, PendingQuotesMap,
};
use wsync_schemas::{
    Amount, BalanceEvent, NodeId, NodeState, Notification, QuoteEvent, QuoteGroup, Unit,
};

use crate::sink::ErrorSink;

pub type BalancesSnapshot = Arc<BalancesMap>;
pub type PendingQuotesSnapshot = Arc<PendingQuotesMap>;

pub struct StateStore {
    balances: watch::Sender<BalancesSnapshot>,
    quotes: watch::Sender<PendingQuotesSnapshot>,
    sink: Arc<dyn ErrorSink>,
}

impl StateStore {
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        let (balances, _) = watch::channel(Arc::new(BalancesMap::new()));
        let (quotes, _) = watch::channel(Arc::new(PendingQuotesMap::new()));
        Self {
            balances,
            quotes,
            sink,
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn balances(&self) -> BalancesSnapshot {
        self.balances.borrow().clone()
    }

    pub fn pending_quotes(&self) -> PendingQuotesSnapshot {
        self.quotes.borrow().clone()
    }

    /// Receiver marked as changed whenever the balances view changes.
    pub fn subscribe_balances(&self) -> watch::Receiver<BalancesSnapshot> {
        self.balances.subscribe()
    }

    pub fn subscribe_pending_quotes(&self) -> watch::Receiver<PendingQuotesSnapshot> {
        self.quotes.subscribe()
    }

    pub fn total_balance_per_unit(&self) -> BTreeMap<Unit, Amount> {
        reconcile::total_balance_per_unit(&self.balances())
    }

    pub fn nodes_with_pending_quotes(&self) -> BTreeSet<NodeId> {
        reconcile::nodes_with_pending_quotes(&self.pending_quotes())
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Replace the balances view with a full poll result.
    pub fn apply_full_balances(&self, nodes: Vec<NodeState>) -> BalancesDiff {
        let mut diff = BalancesDiff::default();
        self.balances.send_if_modified(|snap| {
            let mut next = BalancesMap::clone(snap);
            diff = reconcile::apply_full_balances(&mut next, nodes);
            if next == **snap {
                return false;
            }
            *snap = Arc::new(next);
            true
        });

        if !diff.is_empty() {
            info!(added = ?diff.added, removed = ?diff.removed, "node set changed on balances poll");
        }
        diff
    }

    /// Apply a full quotes poll result. Returns whether the view changed.
    pub fn apply_full_quotes(&self, groups: Vec<QuoteGroup>) -> bool {
        self.quotes.send_if_modified(|snap| {
            let mut next = PendingQuotesMap::clone(snap);
            reconcile::apply_full_quotes(&mut next, groups);
            if next == **snap {
                return false;
            }
            *snap = Arc::new(next);
            true
        })
    }

    pub fn apply_quote_event(&self, event: &QuoteEvent) -> MergeOutcome {
        let mut outcome = MergeOutcome::Applied;
        self.quotes.send_if_modified(|snap| {
            outcome = reconcile::apply_quote_event(Arc::make_mut(snap), event);
            outcome.changed()
        });
        self.observe(&outcome);
        outcome
    }

    pub fn apply_balance_event(&self, event: &BalanceEvent) -> MergeOutcome {
        let mut outcome = MergeOutcome::Applied;
        self.balances.send_if_modified(|snap| {
            if !snap.contains_key(&event.node_id()) {
                outcome = MergeOutcome::Ignored(IgnoreReason::UnknownNode {
                    node_id: event.node_id(),
                });
                return false;
            }
            outcome = reconcile::apply_balance_event(Arc::make_mut(snap), event);
            outcome.changed()
        });
        self.observe(&outcome);
        outcome
    }

    pub fn apply_notification(&self, notification: &Notification) -> MergeOutcome {
        match notification {
            Notification::Quote(ev) => self.apply_quote_event(ev),
            Notification::Balance(ev) => self.apply_balance_event(ev),
        }
    }

    /// Forget a node in both views.
    pub fn remove_node(&self, node_id: NodeId) -> bool {
        let from_balances = self.balances.send_if_modified(|snap| {
            snap.contains_key(&node_id) && Arc::make_mut(snap).remove(&node_id).is_some()
        });
        let from_quotes = self.quotes.send_if_modified(|snap| {
            snap.contains_key(&node_id) && Arc::make_mut(snap).remove(&node_id).is_some()
        });

        let removed = from_balances || from_quotes;
        if removed {
            info!(%node_id, "node removed");
        }
        removed
    }

    fn observe(&self, outcome: &MergeOutcome) {
        match outcome {
            MergeOutcome::Applied => {}
            MergeOutcome::Ignored(reason @ IgnoreReason::UnknownNode { .. }) => {
                warn!(?reason, "balance event dropped");
            }
            MergeOutcome::Ignored(reason) => {
                debug!(?reason, "event dropped");
            }
            MergeOutcome::Clamped(failure) => {
                warn!(%failure, "balance clamped");
                self.sink.soft_failure(failure);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TracingSink;
    use wsync_schemas::{Quote, QuoteId, QuoteKind};

    fn store() -> StateStore {
        StateStore::new(Arc::new(TracingSink))
    }

    #[tokio::test]
    async fn subscribers_are_not_woken_by_no_op_merges() {
        let store = store();
        let mut rx = store.subscribe_pending_quotes();

        let paid = QuoteEvent::Paid {
            quote_type: QuoteKind::Mint,
            node_id: NodeId(1),
            quote_id: QuoteId::from("nope"),
        };
        assert!(!store.apply_quote_event(&paid).changed());
        assert!(!rx.has_changed().unwrap(), "no-op merge must not notify");

        let created = QuoteEvent::Created {
            quote_type: QuoteKind::Mint,
            node_id: NodeId(1),
            quote: Quote::new("q", "sat", 1),
        };
        store.apply_quote_event(&created);
        assert!(rx.has_changed().unwrap(), "real change must notify");
    }

    #[test]
    fn old_snapshots_are_not_mutated() {
        let store = store();
        store.apply_full_balances(vec![NodeState::new(1, "u").with_balance("sat", 10)]);
        let before = store.balances();

        store.apply_balance_event(&BalanceEvent::Increase {
            node_id: NodeId(1),
            unit: Unit::new("sat"),
            amount: 5,
        });

        assert_eq!(before[&NodeId(1)].balance(&Unit::new("sat")), 10);
        assert_eq!(store.balances()[&NodeId(1)].balance(&Unit::new("sat")), 15);
    }

    #[test]
    fn identical_full_poll_does_not_notify() {
        let store = store();
        let nodes = vec![NodeState::new(1, "u").with_balance("sat", 10)];
        store.apply_full_balances(nodes.clone());

        let rx = store.subscribe_balances();
        store.apply_full_balances(nodes);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn zero_decrease_of_unheld_unit_does_not_notify() {
        let store = store();
        store.apply_full_balances(vec![NodeState::new(1, "u").with_balance("sat", 10)]);
        let rx = store.subscribe_balances();

        let outcome = store.apply_balance_event(&BalanceEvent::Decrease {
            node_id: NodeId(1),
            unit: Unit::new("gwei"),
            amount: 0,
        });
        assert!(!outcome.changed());
        assert!(!rx.has_changed().unwrap(), "nothing moved, nobody wakes");
    }

    #[test]
    fn remove_node_reports_absence() {
        let store = store();
        assert!(!store.remove_node(NodeId(4)));
        store.apply_full_balances(vec![NodeState::new(4, "u")]);
        assert!(store.remove_node(NodeId(4)));
        assert!(store.balances().is_empty());
    }
}

//! Scenario: Engine merges push events and full polls
//!
//! # Invariants under test
//!
//! 1. The initial poll populates both views.
//! 2. Push balance events mutate only the referenced node and unit.
//! 3. A decrease below zero clamps and reaches the sink as a soft failure.
//! 4. A `paid` event arriving before its `created` is dropped; the next
//!    full poll is the correction.
//! 5. Shutdown releases the push subscription; later events are not applied.
//! 6. Explicit node removal clears both views.

use std::sync::Arc;
use std::time::Duration;

use wsync_reconcile::SoftFailure;
use wsync_runtime::{EventBus, PollSettings, SyncEngine};
use wsync_schemas::{NodeId, Notification, QuoteKind, Unit};
use wsync_testkit::{
    created, decrease, increase, mint_group, node, paid, sat_quote, RecordingSink,
    ScriptedQueryClient,
};

const SETTLE: Duration = Duration::from_millis(50);

fn slow_settings() -> PollSettings {
    PollSettings {
        balances_interval: Duration::from_secs(60),
        quotes_interval: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn push_events_and_polls_converge() {
    let client = Arc::new(ScriptedQueryClient::new());
    client.set_balances(vec![
        node(1, &[("sat", 500)]),
        node(2, &[("sat", 250), ("gwei", 10)]),
    ]);
    let sink = Arc::new(RecordingSink::new());
    let bus = EventBus::default();

    let engine = SyncEngine::new(client.clone(), sink.clone(), slow_settings());
    engine.start(&bus).await;
    tokio::time::sleep(SETTLE).await;

    let store = engine.store();
    let totals = store.total_balance_per_unit();
    assert_eq!(totals[&Unit::new("sat")], 750);
    assert_eq!(totals[&Unit::new("gwei")], 10);

    // 2. push increase touches one node only
    bus.publish(increase(1, "sat", 100));
    tokio::time::sleep(SETTLE).await;
    let balances = store.balances();
    assert_eq!(balances[&NodeId(1)].balance(&Unit::new("sat")), 600);
    assert_eq!(balances[&NodeId(2)].balance(&Unit::new("sat")), 250);

    // 3. clamp
    bus.publish(decrease(2, "gwei", 15));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(store.balances()[&NodeId(2)].balance(&Unit::new("gwei")), 0);
    let soft = sink.soft_failures();
    assert_eq!(soft.len(), 1, "clamp must be surfaced: {soft:?}");
    assert!(matches!(
        &soft[0],
        SoftFailure::NegativeBalanceClamped { held: 10, requested: 15, .. }
    ));

    // 4. paid before created is dropped; the poll brings the quote in
    bus.publish(Notification::Quote(paid(QuoteKind::Mint, 1, "q1")));
    tokio::time::sleep(SETTLE).await;
    assert!(store.nodes_with_pending_quotes().is_empty());

    client.set_quotes(vec![mint_group(1, vec![], vec![sat_quote("q1", 21)])]);
    engine.trigger_immediate_poll();
    tokio::time::sleep(SETTLE).await;
    let pending = store.pending_quotes();
    assert_eq!(pending[&NodeId(1)].mint.paid.len(), 1);
    assert!(store.nodes_with_pending_quotes().contains(&NodeId(1)));

    // a late `created` for a quote the poll already captured is a no-op
    bus.publish(Notification::Quote(created(
        QuoteKind::Mint,
        1,
        sat_quote("q1", 21),
    )));
    tokio::time::sleep(SETTLE).await;
    let pending = store.pending_quotes();
    assert!(pending[&NodeId(1)].mint.unpaid.is_empty());
    assert_eq!(pending[&NodeId(1)].mint.paid.len(), 1);

    // 6. explicit removal
    assert!(store.remove_node(NodeId(1)));
    assert!(!store.balances().contains_key(&NodeId(1)));
    assert!(!store.pending_quotes().contains_key(&NodeId(1)));

    // 5. shutdown releases the subscription
    engine.shutdown();
    tokio::time::sleep(SETTLE).await;
    assert_eq!(bus.subscriber_count(), 0);
    bus.publish(increase(2, "sat", 1));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(store.balances()[&NodeId(2)].balance(&Unit::new("sat")), 250);

    assert!(sink.reports().is_empty(), "{:?}", sink.reports());
}

#[tokio::test]
async fn subscribers_see_whole_snapshots() {
    let client = Arc::new(ScriptedQueryClient::new());
    client.set_balances(vec![node(1, &[("sat", 1)]), node(2, &[("sat", 2)])]);
    let engine = SyncEngine::new(client.clone(), Arc::new(RecordingSink::new()), slow_settings());
    let mut rx = engine.store().subscribe_balances();

    engine.start(&EventBus::default()).await;
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("balances update within a second")
        .expect("store alive");

    let snap = rx.borrow_and_update().clone();
    assert_eq!(snap.len(), 2, "both nodes land in one update");
}

//! Scenario: a full poll is authoritative for what it covers.
//!
//! - Balances: the whole map is replaced; absent nodes are evicted.
//! - Quotes: each group replaces one node's mint or melt record; the other
//!   kind and other nodes are untouched.

use wsync_reconcile::*;
use wsync_schemas::{NodeId, NodeState, Quote, QuoteEvent, QuoteGroup, QuoteKind};

#[test]
fn second_balances_poll_evicts_missing_node() {
    let a = NodeState::new(1, "https://a.example").with_balance("sat", 10);
    let b = NodeState::new(2, "https://b.example").with_balance("sat", 20);

    let mut map = BalancesMap::new();
    let diff = apply_full_balances(&mut map, vec![a.clone(), b]);
    assert_eq!(diff.added, vec![NodeId(1), NodeId(2)]);
    assert!(diff.removed.is_empty());

    let diff = apply_full_balances(&mut map, vec![a.clone()]);
    assert_eq!(diff.removed, vec![NodeId(2)]);
    assert!(diff.added.is_empty());

    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&NodeId(1)), Some(&a));
}

#[test]
fn balances_poll_overwrites_push_adjustments() {
    let mut map = BalancesMap::new();
    apply_full_balances(
        &mut map,
        vec![NodeState::new(1, "u").with_balance("sat", 10)],
    );
    apply_balance_event(
        &mut map,
        &wsync_schemas::BalanceEvent::Increase {
            node_id: NodeId(1),
            unit: "sat".into(),
            amount: 5,
        },
    );
    apply_full_balances(
        &mut map,
        vec![NodeState::new(1, "u").with_balance("sat", 12)],
    );
    assert_eq!(map[&NodeId(1)].balance(&"sat".into()), 12);
}

#[test]
fn quotes_poll_replaces_only_the_polled_kind() {
    let mut map = PendingQuotesMap::new();
    apply_quote_event(
        &mut map,
        &QuoteEvent::Created {
            quote_type: QuoteKind::Melt,
            node_id: NodeId(1),
            quote: Quote::new("melt-1", "sat", 7),
        },
    );
    apply_quote_event(
        &mut map,
        &QuoteEvent::Created {
            quote_type: QuoteKind::Mint,
            node_id: NodeId(1),
            quote: Quote::new("stale-mint", "sat", 7),
        },
    );

    apply_full_quotes(
        &mut map,
        vec![QuoteGroup::Mint {
            node_id: NodeId(1),
            unpaid: vec![],
            paid: vec![Quote::new("mint-9", "sat", 3)],
        }],
    );

    let rec = &map[&NodeId(1)];
    assert!(rec.mint.unpaid.is_empty(), "stale mint quote replaced");
    assert_eq!(rec.mint.paid, vec![Quote::new("mint-9", "sat", 3)]);
    assert_eq!(rec.melt.unpaid.len(), 1, "melt record untouched");
}

#[test]
fn quotes_poll_leaves_unmentioned_nodes_alone() {
    let mut map = PendingQuotesMap::new();
    apply_full_quotes(
        &mut map,
        vec![QuoteGroup::Melt {
            node_id: NodeId(5),
            unpaid: vec![Quote::new("x", "gwei", 1)],
            pending: vec![],
        }],
    );
    apply_full_quotes(
        &mut map,
        vec![QuoteGroup::Mint {
            node_id: NodeId(6),
            unpaid: vec![],
            paid: vec![],
        }],
    );
    assert_eq!(map[&NodeId(5)].melt.unpaid.len(), 1);
    assert!(map[&NodeId(6)].is_empty());
}

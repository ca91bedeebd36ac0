//! Scenario: every quote event is idempotent.
//!
//! Applying the same event twice must leave the store exactly as applying it
//! once, for every event kind and both quote types. Push delivery is
//! best-effort and may replay; replays must be harmless.

use wsync_reconcile::*;
use wsync_schemas::{NodeId, Quote, QuoteEvent, QuoteId, QuoteKind};

fn seeded() -> PendingQuotesMap {
    let mut map = PendingQuotesMap::new();
    for (kind, id) in [
        (QuoteKind::Mint, "mint-unpaid"),
        (QuoteKind::Mint, "mint-paid"),
        (QuoteKind::Melt, "melt-unpaid"),
        (QuoteKind::Melt, "melt-pending"),
    ] {
        apply_quote_event(
            &mut map,
            &QuoteEvent::Created {
                quote_type: kind,
                node_id: NodeId(1),
                quote: Quote::new(id, "sat", 100),
            },
        );
    }
    apply_quote_event(
        &mut map,
        &QuoteEvent::Paid {
            quote_type: QuoteKind::Mint,
            node_id: NodeId(1),
            quote_id: QuoteId::from("mint-paid"),
        },
    );
    apply_quote_event(
        &mut map,
        &QuoteEvent::Paid {
            quote_type: QuoteKind::Melt,
            node_id: NodeId(1),
            quote_id: QuoteId::from("melt-pending"),
        },
    );
    map
}

fn all_events() -> Vec<QuoteEvent> {
    let id = |s: &str| QuoteId::from(s);
    let node_id = NodeId(1);
    vec![
        QuoteEvent::Created {
            quote_type: QuoteKind::Mint,
            node_id,
            quote: Quote::new("fresh", "sat", 5),
        },
        QuoteEvent::Created {
            quote_type: QuoteKind::Melt,
            node_id,
            quote: Quote::new("fresh-melt", "gwei", 5),
        },
        QuoteEvent::Paid {
            quote_type: QuoteKind::Mint,
            node_id,
            quote_id: id("mint-unpaid"),
        },
        QuoteEvent::Paid {
            quote_type: QuoteKind::Melt,
            node_id,
            quote_id: id("melt-unpaid"),
        },
        QuoteEvent::Redeemed {
            quote_type: QuoteKind::Mint,
            node_id,
            quote_id: id("mint-paid"),
        },
        QuoteEvent::Redeemed {
            quote_type: QuoteKind::Melt,
            node_id,
            quote_id: id("melt-pending"),
        },
        QuoteEvent::Removed {
            quote_type: QuoteKind::Mint,
            node_id,
            quote_id: id("mint-unpaid"),
        },
        QuoteEvent::Removed {
            quote_type: QuoteKind::Melt,
            node_id,
            quote_id: id("melt-pending"),
        },
    ]
}

#[test]
fn applying_an_event_twice_equals_applying_it_once() {
    for event in all_events() {
        let mut once = seeded();
        let first = apply_quote_event(&mut once, &event);
        assert!(first.changed(), "{} should change the seeded state", event.name());

        let mut twice = once.clone();
        let second = apply_quote_event(&mut twice, &event);

        assert!(
            !second.changed(),
            "replayed {} must be a no-op, got {:?}",
            event.name(),
            second
        );
        assert_eq!(once, twice, "replayed {} altered state", event.name());
    }
}

#[test]
fn duplicate_created_reports_already_known() {
    let mut map = seeded();
    let ev = QuoteEvent::Created {
        quote_type: QuoteKind::Mint,
        node_id: NodeId(1),
        quote: Quote::new("mint-paid", "sat", 100),
    };
    let outcome = apply_quote_event(&mut map, &ev);
    assert_eq!(
        outcome,
        MergeOutcome::Ignored(IgnoreReason::AlreadyKnown {
            node_id: NodeId(1),
            quote_id: QuoteId::from("mint-paid"),
        })
    );
    assert_eq!(map, seeded());
}

use wsync_schemas::{
    BalanceEvent, NodeId, NodeState, Quote, QuoteEvent, QuoteGroup, QuoteId, QuoteKind,
};

use crate::{
    BalancesDiff, BalancesMap, IgnoreReason, MergeOutcome, PendingQuotesMap, SoftFailure,
};

/// Remove the quote with `id` from `list`, returning it. Linear scan.
fn take_quote(list: &mut Vec<Quote>, id: &QuoteId) -> Option<Quote> {
    let pos = list.iter().position(|q| &q.id == id)?;
    Some(list.remove(pos))
}

fn unknown_quote(
    node_id: NodeId,
    quote_type: QuoteKind,
    quote_id: &QuoteId,
    event: &'static str,
) -> MergeOutcome {
    MergeOutcome::Ignored(IgnoreReason::UnknownQuote {
        node_id,
        quote_type,
        quote_id: quote_id.clone(),
        event,
    })
}

/// Replace the whole balances view with a poll result.
///
/// Nodes missing from `nodes` are evicted: the poll is authoritative for
/// existence. A node listed twice keeps its last entry.
pub fn apply_full_balances(map: &mut BalancesMap, nodes: Vec<NodeState>) -> BalancesDiff {
    let next: BalancesMap = nodes.into_iter().map(|n| (n.id, n)).collect();

    let added = next.keys().filter(|id| !map.contains_key(id)).copied().collect();
    let removed = map.keys().filter(|id| !next.contains_key(id)).copied().collect();

    *map = next;
    BalancesDiff { added, removed }
}

/// Apply a quotes poll result.
///
/// Each group replaces the `mint` or `melt` record of its node; the other
/// kind's record is left as it was. Nodes not mentioned are untouched.
pub fn apply_full_quotes(map: &mut PendingQuotesMap, groups: Vec<QuoteGroup>) {
    for group in groups {
        let entry = map.entry(group.node_id()).or_default();
        match group {
            QuoteGroup::Mint { unpaid, paid, .. } => {
                entry.mint.unpaid = unpaid;
                entry.mint.paid = paid;
            }
            QuoteGroup::Melt {
                unpaid, pending, ..
            } => {
                entry.melt.unpaid = unpaid;
                entry.melt.pending = pending;
            }
        }
    }
}

/// Apply one push-channel quote event.
///
/// Never creates a quote from an id alone: `paid`/`redeemed`/`removed` for an
/// unknown id are ignored and left for the next full poll to correct.
pub fn apply_quote_event(map: &mut PendingQuotesMap, event: &QuoteEvent) -> MergeOutcome {
    match event {
        QuoteEvent::Created {
            quote_type,
            node_id,
            quote,
        } => {
            let entry = map.entry(*node_id).or_default();
            if entry.contains(&quote.id) {
                return MergeOutcome::Ignored(IgnoreReason::AlreadyKnown {
                    node_id: *node_id,
                    quote_id: quote.id.clone(),
                });
            }
            match quote_type {
                QuoteKind::Mint => entry.mint.unpaid.push(quote.clone()),
                QuoteKind::Melt => entry.melt.unpaid.push(quote.clone()),
            }
            MergeOutcome::Applied
        }

        QuoteEvent::Paid {
            quote_type,
            node_id,
            quote_id,
        } => {
            let Some(entry) = map.get_mut(node_id) else {
                return unknown_quote(*node_id, *quote_type, quote_id, "paid");
            };
            let (from, to) = match quote_type {
                QuoteKind::Mint => (&mut entry.mint.unpaid, &mut entry.mint.paid),
                QuoteKind::Melt => (&mut entry.melt.unpaid, &mut entry.melt.pending),
            };
            match take_quote(from, quote_id) {
                Some(q) => {
                    to.push(q);
                    MergeOutcome::Applied
                }
                None => unknown_quote(*node_id, *quote_type, quote_id, "paid"),
            }
        }

        QuoteEvent::Redeemed {
            quote_type,
            node_id,
            quote_id,
        } => {
            let Some(entry) = map.get_mut(node_id) else {
                return unknown_quote(*node_id, *quote_type, quote_id, "redeemed");
            };
            let removed = match quote_type {
                QuoteKind::Mint => take_quote(&mut entry.mint.paid, quote_id),
                QuoteKind::Melt => take_quote(&mut entry.melt.pending, quote_id),
            };
            match removed {
                Some(_) => MergeOutcome::Applied,
                None => unknown_quote(*node_id, *quote_type, quote_id, "redeemed"),
            }
        }

        QuoteEvent::Removed {
            quote_type,
            node_id,
            quote_id,
        } => {
            let Some(entry) = map.get_mut(node_id) else {
                return unknown_quote(*node_id, *quote_type, quote_id, "removed");
            };
            let (first, second) = match quote_type {
                QuoteKind::Mint => (&mut entry.mint.unpaid, &mut entry.mint.paid),
                QuoteKind::Melt => (&mut entry.melt.unpaid, &mut entry.melt.pending),
            };
            let a = take_quote(first, quote_id).is_some();
            let b = take_quote(second, quote_id).is_some();
            if a || b {
                MergeOutcome::Applied
            } else {
                unknown_quote(*node_id, *quote_type, quote_id, "removed")
            }
        }
    }
}

/// Apply one push-channel balance change.
///
/// Decreases below zero clamp to zero and come back as
/// [`MergeOutcome::Clamped`]; the node's other balances are untouched.
pub fn apply_balance_event(map: &mut BalancesMap, event: &BalanceEvent) -> MergeOutcome {
    let node_id = event.node_id();
    let Some(node) = map.get_mut(&node_id) else {
        return MergeOutcome::Ignored(IgnoreReason::UnknownNode { node_id });
    };

    match event {
        BalanceEvent::Increase { amount: 0, .. } | BalanceEvent::Decrease { amount: 0, .. } => {
            MergeOutcome::Ignored(IgnoreReason::ZeroAmount { node_id })
        }
        BalanceEvent::Increase { unit, amount, .. } => {
            let slot = node.balances.entry(unit.clone()).or_insert(0);
            *slot = slot.saturating_add(*amount);
            MergeOutcome::Applied
        }
        BalanceEvent::Decrease { unit, amount, .. } => {
            let held = node.balance(unit);
            match held.checked_sub(*amount) {
                Some(left) => {
                    if let Some(slot) = node.balances.get_mut(unit) {
                        *slot = left;
                    }
                    MergeOutcome::Applied
                }
                None => {
                    if let Some(slot) = node.balances.get_mut(unit) {
                        *slot = 0;
                    }
                    MergeOutcome::Clamped(SoftFailure::NegativeBalanceClamped {
                        node_id,
                        unit: unit.clone(),
                        held,
                        requested: *amount,
                    })
                }
            }
        }
    }
}

/// Explicit node removal. Deletes the node from both views.
pub fn remove_node(
    balances: &mut BalancesMap,
    quotes: &mut PendingQuotesMap,
    node_id: NodeId,
) -> bool {
    let a = balances.remove(&node_id).is_some();
    let b = quotes.remove(&node_id).is_some();
    a || b
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsync_schemas::Unit;

    fn created(kind: QuoteKind, node: u32, id: &str) -> QuoteEvent {
        QuoteEvent::Created {
            quote_type: kind,
            node_id: NodeId(node),
            quote: Quote::new(id, "sat", 10),
        }
    }

    #[test]
    fn created_then_paid_moves_mint_quote() {
        let mut map = PendingQuotesMap::new();
        let outcome = apply_quote_event(&mut map, &created(QuoteKind::Mint, 1, "q"));
        assert_eq!(outcome, MergeOutcome::Applied);

        let paid = QuoteEvent::Paid {
            quote_type: QuoteKind::Mint,
            node_id: NodeId(1),
            quote_id: QuoteId::from("q"),
        };
        assert_eq!(apply_quote_event(&mut map, &paid), MergeOutcome::Applied);

        let rec = &map[&NodeId(1)];
        assert!(rec.mint.unpaid.is_empty());
        assert_eq!(rec.mint.paid.len(), 1);
    }

    #[test]
    fn created_is_deduplicated_across_kinds() {
        let mut map = PendingQuotesMap::new();
        apply_quote_event(&mut map, &created(QuoteKind::Mint, 1, "q"));
        let outcome = apply_quote_event(&mut map, &created(QuoteKind::Melt, 1, "q"));
        assert!(matches!(
            outcome,
            MergeOutcome::Ignored(IgnoreReason::AlreadyKnown { .. })
        ));
        assert!(map[&NodeId(1)].melt.unpaid.is_empty());
    }

    #[test]
    fn melt_redeemed_only_clears_pending() {
        let mut map = PendingQuotesMap::new();
        apply_quote_event(&mut map, &created(QuoteKind::Melt, 1, "m"));
        let redeemed = QuoteEvent::Redeemed {
            quote_type: QuoteKind::Melt,
            node_id: NodeId(1),
            quote_id: QuoteId::from("m"),
        };
        let outcome = apply_quote_event(&mut map, &redeemed);
        assert!(!outcome.changed(), "unpaid melt quote is not redeemable");
        assert_eq!(map[&NodeId(1)].melt.unpaid.len(), 1);
    }

    #[test]
    fn increase_creates_missing_unit() {
        let mut map = BalancesMap::new();
        apply_full_balances(&mut map, vec![NodeState::new(1, "u")]);
        let ev = BalanceEvent::Increase {
            node_id: NodeId(1),
            unit: Unit::new("gwei"),
            amount: 5,
        };
        assert_eq!(apply_balance_event(&mut map, &ev), MergeOutcome::Applied);
        assert_eq!(map[&NodeId(1)].balance(&Unit::new("gwei")), 5);
    }

    #[test]
    fn zero_amount_events_change_nothing() {
        let mut map = BalancesMap::new();
        apply_full_balances(&mut map, vec![NodeState::new(1, "u")]);
        let before = map.clone();

        for ev in [
            BalanceEvent::Decrease {
                node_id: NodeId(1),
                unit: Unit::new("gwei"),
                amount: 0,
            },
            BalanceEvent::Increase {
                node_id: NodeId(1),
                unit: Unit::new("gwei"),
                amount: 0,
            },
        ] {
            let outcome = apply_balance_event(&mut map, &ev);
            assert_eq!(
                outcome,
                MergeOutcome::Ignored(IgnoreReason::ZeroAmount { node_id: NodeId(1) })
            );
            assert!(!outcome.changed());
        }
        assert_eq!(map, before, "no zero-valued unit slot may appear");
    }

    #[test]
    fn balance_event_for_unknown_node_is_ignored() {
        let mut map = BalancesMap::new();
        let ev = BalanceEvent::Decrease {
            node_id: NodeId(9),
            unit: Unit::new("sat"),
            amount: 1,
        };
        assert_eq!(
            apply_balance_event(&mut map, &ev),
            MergeOutcome::Ignored(IgnoreReason::UnknownNode { node_id: NodeId(9) })
        );
        assert!(map.is_empty());
    }

    #[test]
    fn remove_node_clears_both_views() {
        let mut balances = BalancesMap::new();
        let mut quotes = PendingQuotesMap::new();
        apply_full_balances(&mut balances, vec![NodeState::new(1, "u")]);
        apply_quote_event(&mut quotes, &created(QuoteKind::Mint, 1, "q"));

        assert!(remove_node(&mut balances, &mut quotes, NodeId(1)));
        assert!(balances.is_empty() && quotes.is_empty());
        assert!(!remove_node(&mut balances, &mut quotes, NodeId(1)));
    }
}

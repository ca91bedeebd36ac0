//! Derived views. Pure functions of a snapshot; safe to recompute on every change.

use std::collections::{BTreeMap, BTreeSet};

use wsync_schemas::{Amount, NodeId, Price, Unit};

use crate::{BalancesMap, PendingQuotesMap};

/// Sum of balances across all nodes, grouped by unit.
///
/// Units whose total is zero are omitted. Sums saturate at `Amount::MAX`.
pub fn total_balance_per_unit(nodes: &BalancesMap) -> BTreeMap<Unit, Amount> {
    let mut totals: BTreeMap<Unit, Amount> = BTreeMap::new();
    for node in nodes.values() {
        for (unit, amount) in &node.balances {
            if *amount == 0 {
                continue;
            }
            let slot = totals.entry(unit.clone()).or_insert(0);
            *slot = slot.saturating_add(*amount);
        }
    }
    totals
}

/// Nodes with at least one outstanding mint or melt quote.
pub fn nodes_with_pending_quotes(pending: &PendingQuotesMap) -> BTreeSet<NodeId> {
    pending
        .iter()
        .filter(|(_, quotes)| !quotes.is_empty())
        .map(|(id, _)| *id)
        .collect()
}

/// Value of `totals` in the display currency.
///
/// Each unit is converted to its asset's display amount (divided by the unit
/// precision) and multiplied by the price whose symbol matches the asset,
/// case-insensitively. Units without an asset or without a price add nothing.
pub fn total_in_display_currency(totals: &BTreeMap<Unit, Amount>, prices: &[Price]) -> f64 {
    totals
        .iter()
        .filter_map(|(unit, amount)| {
            let asset = unit.asset_symbol()?;
            let price = prices
                .iter()
                .find(|p| p.symbol.eq_ignore_ascii_case(asset))?;
            let display = *amount as f64 / unit.precision() as f64;
            Some(display * price.value)
        })
        .sum()
}

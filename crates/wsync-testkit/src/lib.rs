//! Deterministic fakes for the sync engine's external collaborators.
//!
//! - [`ScriptedQueryClient`]: in-memory `RemoteQueryClient` with configurable
//!   latency, failure injection and a concurrent-call high-water mark
//! - [`RecordingSink`]: `ErrorSink` that keeps everything it is given
//! - builders for nodes, quotes and events
//!
//! No network I/O.

mod scripted_client;
mod sink;

pub use scripted_client::ScriptedQueryClient;
pub use sink::{RecordingSink, Report};

use wsync_schemas::{
    Amount, BalanceEvent, NodeId, NodeState, Notification, Quote, QuoteEvent, QuoteGroup, QuoteId,
    QuoteKind, Unit,
};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Node with the given `(unit, amount)` balances.
pub fn node(id: u32, balances: &[(&str, Amount)]) -> NodeState {
    balances
        .iter()
        .fold(NodeState::new(id, format!("http://node-{id}.test")), |n, (u, a)| {
            n.with_balance(*u, *a)
        })
}

pub fn sat_quote(id: &str, amount: Amount) -> Quote {
    Quote::new(id, "sat", amount)
}

pub fn mint_group(node_id: u32, unpaid: Vec<Quote>, paid: Vec<Quote>) -> QuoteGroup {
    QuoteGroup::Mint {
        node_id: NodeId(node_id),
        unpaid,
        paid,
    }
}

pub fn melt_group(node_id: u32, unpaid: Vec<Quote>, pending: Vec<Quote>) -> QuoteGroup {
    QuoteGroup::Melt {
        node_id: NodeId(node_id),
        unpaid,
        pending,
    }
}

pub fn created(kind: QuoteKind, node_id: u32, quote: Quote) -> QuoteEvent {
    QuoteEvent::Created {
        quote_type: kind,
        node_id: NodeId(node_id),
        quote,
    }
}

pub fn paid(kind: QuoteKind, node_id: u32, id: &str) -> QuoteEvent {
    QuoteEvent::Paid {
        quote_type: kind,
        node_id: NodeId(node_id),
        quote_id: QuoteId::from(id),
    }
}

pub fn redeemed(kind: QuoteKind, node_id: u32, id: &str) -> QuoteEvent {
    QuoteEvent::Redeemed {
        quote_type: kind,
        node_id: NodeId(node_id),
        quote_id: QuoteId::from(id),
    }
}

pub fn removed(kind: QuoteKind, node_id: u32, id: &str) -> QuoteEvent {
    QuoteEvent::Removed {
        quote_type: kind,
        node_id: NodeId(node_id),
        quote_id: QuoteId::from(id),
    }
}

pub fn increase(node_id: u32, unit: &str, amount: Amount) -> Notification {
    Notification::Balance(BalanceEvent::Increase {
        node_id: NodeId(node_id),
        unit: Unit::new(unit),
        amount,
    })
}

pub fn decrease(node_id: u32, unit: &str, amount: Amount) -> Notification {
    Notification::Balance(BalanceEvent::Decrease {
        node_id: NodeId(node_id),
        unit: Unit::new(unit),
        amount,
    })
}

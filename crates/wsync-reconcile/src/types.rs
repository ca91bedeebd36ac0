use std::collections::BTreeMap;

use serde::Serialize;
use wsync_schemas::{Amount, NodeId, NodePendingQuotes, NodeState, QuoteId, QuoteKind, Unit};

/// Authoritative balances view, keyed by node.
pub type BalancesMap = BTreeMap<NodeId, NodeState>;

/// Authoritative pending-quotes view, keyed by node.
pub type PendingQuotesMap = BTreeMap<NodeId, NodePendingQuotes>;

/// Result of a single merge step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// State changed.
    Applied,
    /// Nothing changed; see the reason.
    Ignored(IgnoreReason),
    /// A balance decrease was clamped at zero.
    Clamped(SoftFailure),
}

impl MergeOutcome {
    /// Whether the merge modified any map.
    pub fn changed(&self) -> bool {
        match self {
            MergeOutcome::Applied => true,
            MergeOutcome::Ignored(_) => false,
            MergeOutcome::Clamped(SoftFailure::NegativeBalanceClamped { held, .. }) => *held > 0,
        }
    }

    pub fn soft_failure(&self) -> Option<&SoftFailure> {
        match self {
            MergeOutcome::Clamped(f) => Some(f),
            _ => None,
        }
    }
}

/// Why an event left the state untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// `created` for a quote id the node already tracks.
    AlreadyKnown { node_id: NodeId, quote_id: QuoteId },
    /// The quote id is not in any list the event could apply to.
    UnknownQuote {
        node_id: NodeId,
        quote_type: QuoteKind,
        quote_id: QuoteId,
        event: &'static str,
    },
    /// Balance event for a node the balances view does not hold.
    UnknownNode { node_id: NodeId },
    /// Balance event moving nothing.
    ZeroAmount { node_id: NodeId },
}

/// Non-fatal inconsistency observed while merging.
///
/// Surfaced to the error sink as a warning, never as a hard error; the next
/// full poll is the correction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftFailure {
    #[error(
        "balance of node {node_id} in {unit} would go negative \
         (held {held}, decrease {requested}); clamped to 0"
    )]
    NegativeBalanceClamped {
        node_id: NodeId,
        unit: Unit,
        held: Amount,
        requested: Amount,
    },
}

/// Node churn caused by a full balances poll.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BalancesDiff {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl BalancesDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

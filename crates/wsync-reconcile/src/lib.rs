//! wsync-reconcile
//!
//! Merge rules for the wallet's local view of node balances and pending
//! quotes, plus the aggregate views derived from that view.
//!
//! - A full poll result replaces what it covers wholesale.
//! - A push event mutates only the sub-list it references.
//! - Every merge is idempotent and existence-checked, so poll results and push
//!   events may arrive in any order.
//! - Nothing here fails: unmatched events come back as
//!   [`MergeOutcome::Ignored`], impossible balance decreases as
//!   [`MergeOutcome::Clamped`].
//!
//! Deterministic, pure logic. No IO, no locking; the runtime store owns the
//! maps and applies these functions one update at a time.

mod aggregate;
mod engine;
mod types;

pub use aggregate::{nodes_with_pending_quotes, total_balance_per_unit, total_in_display_currency};
pub use engine::{
    apply_balance_event, apply_full_balances, apply_full_quotes, apply_quote_event, remove_node,
};
pub use types::*;

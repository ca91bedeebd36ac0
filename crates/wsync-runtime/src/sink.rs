//! Where user-visible failures go.
//!
//! The sink is fire-and-forget: implementations must not block, must not
//! fail and must not call back into the store.

use std::error::Error as StdError;

use tracing::{error, warn};
use wsync_reconcile::SoftFailure;

use crate::error::error_chain;

pub trait ErrorSink: Send + Sync {
    /// A refresh failed. `user_message` is short and presentable.
    fn report(&self, user_message: &str, cause: &(dyn StdError + Send + Sync + 'static));

    /// A merge succeeded but had to paper over an inconsistency.
    fn soft_failure(&self, failure: &SoftFailure) {
        warn!(%failure, "soft failure during reconciliation");
    }
}

/// Log-only sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, user_message: &str, cause: &(dyn StdError + Send + Sync + 'static)) {
        error!(cause = %error_chain(cause), "{user_message}");
    }
}

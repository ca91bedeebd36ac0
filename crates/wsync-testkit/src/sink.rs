use std::error::Error as StdError;
use std::sync::{Mutex, PoisonError};

use wsync_reconcile::SoftFailure;
use wsync_runtime::{error_chain, ErrorSink};

/// One `report` call, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub user_message: String,
    pub cause: String,
}

/// Keeps every report and soft failure it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
    soft_failures: Mutex<Vec<SoftFailure>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn soft_failures(&self) -> Vec<SoftFailure> {
        self.soft_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, user_message: &str, cause: &(dyn StdError + Send + Sync + 'static)) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Report {
                user_message: user_message.to_string(),
                cause: error_chain(cause),
            });
    }

    fn soft_failure(&self, failure: &SoftFailure) {
        self.soft_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure.clone());
    }
}

use std::error::Error as StdError;

/// Failure talking to a remote endpoint. Always treated as transient.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Transport-agnostic failure (non-HTTP clients, fakes).
    #[error("transient failure: {0}")]
    Transient(String),
}

/// A refresh that did not reach the store.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to fetch node balances")]
    Balances(#[source] QueryError),
    #[error("failed to fetch pending quotes")]
    Quotes(#[source] QueryError),
    #[error("failed to fetch prices")]
    Prices(#[source] QueryError),
}

/// Render an error and all its sources as `outer: inner: root`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cur = e.source();
    }
    out
}

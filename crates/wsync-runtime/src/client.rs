use serde::de::DeserializeOwned;
use wsync_schemas::{NodeState, QuoteGroup};

use crate::error::QueryError;

/// Full-poll source for the two state views.
///
/// Every call returns a complete, authoritative snapshot or an error. Errors
/// are transient; the caller retries on its next tick.
#[async_trait::async_trait]
pub trait RemoteQueryClient: Send + Sync {
    async fn fetch_node_balances(&self) -> Result<Vec<NodeState>, QueryError>;

    async fn fetch_pending_quotes(&self) -> Result<Vec<QuoteGroup>, QueryError>;
}

/// JSON-over-HTTP client for the node API.
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpQueryClient {
    pub fn new_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, QueryError> {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| QueryError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(QueryError::Status {
                url,
                status: status.as_u16(),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|source| QueryError::Decode { url, source })
    }
}

#[async_trait::async_trait]
impl RemoteQueryClient for HttpQueryClient {
    async fn fetch_node_balances(&self) -> Result<Vec<NodeState>, QueryError> {
        self.get_json("/v1/balances").await
    }

    async fn fetch_pending_quotes(&self) -> Result<Vec<QuoteGroup>, QueryError> {
        self.get_json("/v1/quotes/pending").await
    }
}

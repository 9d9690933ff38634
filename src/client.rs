//! Main CrUX client implementation.

use crate::backoff::{Backoff, RandomizedBackoff};
use crate::batch::run_batch;
use crate::error::{Error, Result};
use crate::types::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://chromeuxreport.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_MAX_RETRY_TIMEOUT_MS: u64 = 100_000;

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    max_retry_timeout: Duration,
    backoff: Option<Arc<dyn Backoff>>,
}

impl ClientBuilder {
    /// Create a new client builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_retry_timeout: Duration::from_millis(DEFAULT_MAX_RETRY_TIMEOUT_MS),
            backoff: None,
        }
    }

    /// Set the API base URL. Overriding it is the seam for pointing the
    /// client at a mock server in tests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many retries follow a rate-limited attempt. With `n`
    /// retries, at most `n + 1` HTTP calls are made per operation.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the ceiling for the randomized delay between retries.
    pub fn max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout = timeout;
        self
    }

    /// Replace the default randomized backoff with a custom strategy.
    pub fn backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        if self.api_key.is_empty() {
            return Err(Error::Config("API key is required".into()));
        }

        if !self.base_url.starts_with("https://") {
            warn!(
                base_url = %self.base_url,
                "API base URL is not using HTTPS. This is insecure."
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Error::Http)?;

        let backoff = self
            .backoff
            .unwrap_or_else(|| Arc::new(RandomizedBackoff::new(self.max_retry_timeout)));

        Ok(Client {
            api_key: self.api_key,
            base_url: self.base_url,
            http_client,
            max_retries: self.max_retries,
            backoff,
        })
    }
}

/// Client for the Chrome UX Report API.
///
/// Handles single-record and history queries plus batched lookups, with
/// randomized-delay retries for rate-limited requests. One client can be
/// shared freely; every call owns its own state.
///
/// # Example
///
/// ```rust,no_run
/// use crux_api::{Client, FormFactor, QueryOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), crux_api::Error> {
///     let client = Client::builder("your-api-key").build()?;
///
///     let result = client.query_record(&QueryOptions {
///         origin: Some("https://example.com".into()),
///         form_factor: Some(FormFactor::Phone),
///         ..Default::default()
///     }).await?;
///
///     match result {
///         Some(response) => println!("{:?}", response.record.metrics),
///         None => println!("no data collected for this origin"),
///     }
///     Ok(())
/// }
/// ```
pub struct Client {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) http_client: reqwest::Client,
    pub(crate) max_retries: u32,
    pub(crate) backoff: Arc<dyn Backoff>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    /// Look up the current record for one URL or origin.
    ///
    /// Returns `None` when the API has no data for the query (error code
    /// 404). Rate-limited attempts are retried with a randomized delay.
    pub async fn query_record(&self, options: &QueryOptions) -> Result<Option<QueryResponse>> {
        match self.query_endpoint("v1/records:queryRecord", options).await? {
            Some(payload) => Ok(Some(serde_json::from_value(payload)?)),
            None => Ok(None),
        }
    }

    /// Look up the weekly history record for one URL or origin.
    ///
    /// Same protocol and retry behavior as [`query_record`](Self::query_record),
    /// against the `records:queryHistoryRecord` endpoint.
    pub async fn query_history_record(
        &self,
        options: &QueryOptions,
    ) -> Result<Option<HistoryResponse>> {
        match self
            .query_endpoint("v1/records:queryHistoryRecord", options)
            .await?
        {
            Some(payload) => Ok(Some(serde_json::from_value(payload)?)),
            None => Ok(None),
        }
    }

    /// Run many record lookups as one batched HTTP call.
    ///
    /// Results come back in the same order as `queries`, with `None` at
    /// positions the API had no data for. Items rate-limited within the
    /// batch are re-sent on their own in later rounds until they resolve
    /// or the retry budget runs out.
    pub async fn batch(&self, queries: Vec<QueryOptions>) -> Result<Vec<Option<QueryResponse>>> {
        run_batch(self, queries).await
    }

    /// POST one query to a `records:*` endpoint, absorbing 404 into
    /// `None` and retrying whole-request 429s.
    async fn query_endpoint(&self, endpoint: &str, options: &QueryOptions) -> Result<Option<Value>> {
        let url = format!("{}/{}?key={}", self.base_url, endpoint, self.api_key);
        let mut attempt: u32 = 1;

        loop {
            let response = self.http_client.post(&url).json(options).send().await?;
            let status = response.status();
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Transport {
                    status: status.as_u16(),
                    body,
                });
            }

            let payload: Value = response.json().await?;
            if payload.get("error").is_some() {
                let body: ApiErrorBody = serde_json::from_value(payload)?;
                match body.error.code {
                    404 => return Ok(None),
                    429 if attempt <= self.max_retries => {
                        let delay = self.backoff.delay(attempt);
                        warn!(
                            attempt,
                            max_retries = self.max_retries,
                            ?delay,
                            "rate limited, retrying query"
                        );
                        sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    429 => return Err(Error::RetriesExhausted { attempts: attempt }),
                    code => {
                        return Err(Error::Api {
                            code,
                            message: body.error.message,
                            status: body.error.status,
                        })
                    }
                }
            }

            if payload.get("record").and_then(|record| record.get("key")).is_none() {
                return Err(Error::MalformedResponse(payload.to_string()));
            }
            return Ok(Some(payload));
        }
    }
}

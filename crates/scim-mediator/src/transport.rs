//! Fault-tolerant HTTP transport.
//!
//! Turns the remote directory's unreliable HTTP API into an effectively
//! reliable one: every request is attempted up to `RetryPolicy::max_attempts`
//! times with exponential backoff on 429/5xx and a short fixed delay on
//! connection-level failures. Delivery is at-least-once: a retried request
//! may already have been applied by the server.

use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::ApiKey;
use crate::config::MediatorConfig;
use crate::error::{MediatorError, MediatorResult};
use crate::retry::{sleep_or_cancel, RetryOutcome, RetryPolicy};

/// Media type used for both request and response bodies.
pub const SCIM_MEDIA_TYPE: &str = "application/scim+json";

const USER_AGENT: &str = concat!("scim-mediator/", env!("CARGO_PKG_VERSION"));

/// A request that can be replayed identically on every attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `/Users/abc`.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Owned body bytes; cloned into each attempt.
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body serialized once up front.
    pub fn json<B: serde::Serialize>(mut self, body: &B) -> MediatorResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            MediatorError::MalformedResponse(format!("failed to encode request body: {e}"))
        })?;
        self.body = Some(bytes);
        Ok(self)
    }
}

/// HTTP transport with bounded retry and cooperative cancellation.
#[derive(Debug, Clone)]
pub struct Transport {
    base_url: String,
    api_key: ApiKey,
    policy: RetryPolicy,
    http_client: Client,
}

impl Transport {
    /// Build a transport from configuration.
    pub fn new(config: &MediatorConfig) -> MediatorResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MediatorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(
            config.api_url.clone(),
            config.api_key.clone(),
            config.retry.clone(),
            http_client,
        ))
    }

    /// Create a transport with a pre-built `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(
        base_url: String,
        api_key: ApiKey,
        policy: RetryPolicy,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key,
            policy,
            http_client,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a request, retrying transient failures.
    ///
    /// Returns the raw response body (empty for 204). Fails with
    /// [`MediatorError::Cancelled`] if the token fires before an attempt or
    /// during a backoff sleep, [`MediatorError::Terminal`] on a non-retryable
    /// status, and [`MediatorError::Exhausted`] once every attempt failed.
    pub async fn execute(
        &self,
        request: &TransportRequest,
        cancel: &CancellationToken,
    ) -> MediatorResult<Vec<u8>> {
        let url = format!("{}{}", self.base_url, request.path);
        let max_attempts = self.policy.max_attempts;
        let mut last_cause = String::from("no attempt was made");

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return Err(MediatorError::Cancelled);
            }

            debug!(
                method = %request.method,
                url = %url,
                attempt = attempt + 1,
                "Making API request"
            );

            let outcome = match self.attempt(&url, request).await {
                Ok((status, body)) => RetryOutcome::from_status(status, body, attempt, &self.policy),
                Err(err) => RetryOutcome::from_transport_error(&err, &self.policy),
            };

            match outcome {
                RetryOutcome::Success(body) => {
                    if attempt > 0 {
                        debug!(url = %url, attempt = attempt + 1, "Request succeeded after retries");
                    }
                    return Ok(body);
                }
                RetryOutcome::Terminal(err) => return Err(err),
                RetryOutcome::Retryable { cause, delay } => {
                    warn!(
                        method = %request.method,
                        url = %url,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %cause,
                        "Retryable API failure"
                    );
                    last_cause = cause;
                    if self.policy.has_attempts_after(attempt) {
                        debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                        sleep_or_cancel(delay, cancel).await?;
                    }
                }
            }
        }

        warn!(url = %url, attempts = max_attempts, error = %last_cause, "Max attempts exceeded");
        Err(MediatorError::Exhausted {
            attempts: max_attempts,
            last_cause,
        })
    }

    /// One HTTP round trip. Reading the body is part of the attempt, so a
    /// truncated response counts as a transport-level failure.
    async fn attempt(
        &self,
        url: &str,
        request: &TransportRequest,
    ) -> Result<(u16, Vec<u8>), reqwest::Error> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .header(reqwest::header::CONTENT_TYPE, SCIM_MEDIA_TYPE)
            .header(reqwest::header::ACCEPT, SCIM_MEDIA_TYPE);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let builder = self.api_key.apply(builder);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

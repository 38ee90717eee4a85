//! Resilient HTTP transport with cool-down spacing and deadline-bounded retry
//!
//! Every portal call goes through [`ResilientTransport::execute`]. The
//! transport enforces a minimum spacing between consecutive requests (the
//! portal throttles aggressive clients), retries the retryable status set
//! (408, 429, any 5xx) with linearly growing backoff, and gives up once a
//! wall-clock deadline passes — at which point the *last received response*
//! is returned rather than raised, so callers always inspect the status.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use reqwest::{Method, Response, StatusCode};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Whether a response status should be retried.
///
/// Transient conditions: request timeout, throttling, any server-side error.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// HTTP transport shared by every portal endpoint
///
/// The only mutable state is the "not-before" timestamp implementing the
/// inter-request cool-down. Calls are expected to be sequential; the mutex
/// exists for `&self` access, not for concurrent callers.
pub struct ResilientTransport {
    client: reqwest::Client,
    config: TransportConfig,
    api_token: Option<String>,
    not_before: Mutex<Option<Instant>>,
    cancel: CancellationToken,
}

impl ResilientTransport {
    /// Create a transport with the given resilience settings.
    pub fn new(config: TransportConfig, api_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            api_token,
            not_before: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Token cancelling all in-flight waits; cloned by callers that need to
    /// abort a long retry loop early.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a request, retrying transient failures until the deadline.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    /// * `url` - Absolute request URL
    /// * `body` - Optional JSON body
    ///
    /// # Returns
    ///
    /// The final response. After the deadline expires the last received
    /// response is returned even when its status is retryable; callers must
    /// inspect the status explicitly.
    ///
    /// # Errors
    ///
    /// `Error::Network` when no response was ever received within the
    /// deadline, `Error::Cancelled` when the cancellation token fires.
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        self.execute_with_range(method, url, body, None).await
    }

    /// Range-read variant of [`execute`](Self::execute): identical retry
    /// contract plus an HTTP byte-range header.
    pub async fn get_partial(&self, url: Url, from_byte: u64, to_byte: u64) -> Result<Response> {
        self.execute_with_range(Method::GET, url, None, Some((from_byte, to_byte)))
            .await
    }

    async fn execute_with_range(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        range: Option<(u64, u64)>,
    ) -> Result<Response> {
        let deadline = Instant::now() + self.config.deadline;
        let mut attempt: u32 = 0;
        let mut last_error: Option<Error> = None;

        loop {
            attempt += 1;

            self.wait_for_cooldown().await?;
            let result = self.send_once(&method, &url, &body, range).await;
            self.advance_cooldown().await;

            match result {
                Ok(response) if !is_retryable_status(response.status()) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, url = %url, "request succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            %status,
                            attempts = attempt,
                            url = %url,
                            "retry deadline expired, returning last response as-is"
                        );
                        return Ok(response);
                    }
                    tracing::warn!(
                        %status,
                        attempt = attempt,
                        url = %url,
                        "retryable status, backing off"
                    );
                }
                Err(e) => {
                    if Instant::now() >= deadline {
                        tracing::error!(error = %e, attempts = attempt, url = %url, "network error after deadline");
                        return Err(e);
                    }
                    tracing::warn!(error = %e, attempt = attempt, url = %url, "network error, backing off");
                    last_error = Some(e);
                }
            }

            // Linear backoff: attempt N waits N x base_delay, unbounded growth.
            let delay = self.config.base_delay.saturating_mul(attempt);
            if let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                self.sleep_cancellable(delay.min(remaining)).await?;
            } else if let Some(e) = last_error.take() {
                return Err(e);
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: &Option<serde_json::Value>,
        range: Option<(u64, u64)>,
    ) -> Result<Response> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        if let Some(json) = body {
            request = request.json(json);
        }
        if let Some((from, to)) = range {
            request = request.header(reqwest::header::RANGE, format!("bytes={}-{}", from, to));
        }
        Ok(request.send().await?)
    }

    /// Suspend until the stored not-before timestamp passes.
    async fn wait_for_cooldown(&self) -> Result<()> {
        let not_before = *self.not_before.lock().await;
        if let Some(at) = not_before {
            let now = Instant::now();
            if at > now {
                self.sleep_cancellable(at - now).await?;
            }
        }
        Ok(())
    }

    /// Advance the not-before timestamp; called after every attempt,
    /// success or failure.
    async fn advance_cooldown(&self) {
        let mut not_before = self.not_before.lock().await;
        *not_before = Some(Instant::now() + self.config.cooldown);
    }

    async fn sleep_cancellable(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

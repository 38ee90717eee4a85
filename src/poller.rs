//! Registration status polling for outbound messages
//!
//! After submitting a message the portal registers it asynchronously. The
//! poller re-fetches the message on a fixed cadence until it reaches a
//! terminal status: acceptance resolves the wait, a terminal failure is
//! turned into [`Error::Rejected`] carrying the newest receipt detail, and
//! an expired deadline hands back the last observed state so the caller
//! can decide what to do with an still-pending message.

use crate::client::PortalClient;
use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::types::{Message, MessageId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fallback detail when no failure receipt carries a message.
const GENERIC_REJECTION: &str = "the portal reported a failure without detail";

/// Waits for an outbound message to reach a terminal status
pub struct StatusPoller<'a> {
    client: &'a PortalClient,
    config: PollConfig,
    cancel: CancellationToken,
}

impl<'a> StatusPoller<'a> {
    /// Poller over the given client and cadence settings.
    pub fn new(client: &'a PortalClient, config: PollConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelling an in-flight wait.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll until `id` reaches a terminal status or the deadline expires.
    ///
    /// The first fetch happens immediately; subsequent fetches are spaced
    /// by the configured interval.
    ///
    /// # Returns
    ///
    /// The accepted message, or the last observed message when the
    /// deadline expires while the status is still non-terminal.
    ///
    /// # Errors
    ///
    /// `Error::Rejected` when the portal resolves the message to a
    /// terminal failure, `Error::Timeout` when the deadline expires
    /// without a single successful observation, `Error::Cancelled` when
    /// the token fires.
    pub async fn wait_for_registration(&self, id: &MessageId) -> Result<Message> {
        let deadline = Instant::now() + self.config.poll_deadline;
        let mut last_seen: Option<Message> = None;

        loop {
            match self.client.get_message(id).await {
                Ok(message) => {
                    debug!(%id, status = ?message.status, "polled message status");
                    if message.status.is_accepted() {
                        info!(%id, status = ?message.status, "message accepted");
                        return Ok(message);
                    }
                    if message.status.is_failed() {
                        let detail = message
                            .newest_failure_receipt()
                            .and_then(|r| r.message.clone())
                            .unwrap_or_else(|| GENERIC_REJECTION.to_string());
                        warn!(%id, %detail, "message resolved to a terminal failure");
                        return Err(Error::Rejected {
                            id: id.to_string(),
                            detail,
                        });
                    }
                    last_seen = Some(message);
                }
                // The message may not be visible yet right after submission.
                Err(Error::NotFound(_)) => {
                    debug!(%id, "message not visible yet");
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return match last_seen {
                    Some(message) => {
                        warn!(%id, status = ?message.status, "deadline expired, returning last observed state");
                        Ok(message)
                    }
                    None => Err(Error::Timeout(self.config.poll_deadline)),
                };
            }

            let wait = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

//! Rate-limit aware notification delivery.
//!
//! # Retry Strategy
//!
//! - Rate-limit signal: wait exactly the mandated duration, retry once
//! - Second failure of any kind: give up
//! - Any other transport error: give up immediately
//!
//! Giving up is never fatal to the caller: the error is logged here and
//! returned so the engine can leave the message unrecorded and move on.
//! The wait is raced against the shutdown token so a pending rate limit
//! does not hold up shutdown.

use crate::transport::{Transport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Reason a notification was not delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The retry after the mandated wait was rate limited again.
    #[error("still rate limited after waiting {}s (asked to wait {}s more)", waited.as_secs(), retry_after.as_secs())]
    RateLimitedTwice {
        /// Time already spent waiting.
        waited: Duration,
        /// Wait requested by the second rate-limit signal.
        retry_after: Duration,
    },

    /// The transport failed.
    #[error("transport failed after {attempts} attempt(s): {source}")]
    Transport {
        /// Send attempts made.
        attempts: u32,
        /// The last transport error.
        #[source]
        source: TransportError,
    },

    /// Shutdown was requested during the rate-limit wait.
    #[error("cancelled while waiting out a rate limit")]
    Cancelled,
}

/// Details of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Send attempts made (1 or 2).
    pub attempts: u32,
    /// Time spent waiting out a rate limit.
    pub waited: Duration,
}

/// Sends notifications through a [`Transport`].
pub struct Delivery {
    transport: Arc<dyn Transport>,
    shutdown: CancellationToken,
}

impl Delivery {
    /// Creates a delivery front-end for `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `token` to abort rate-limit waits on shutdown.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Sends `text` to `destination`, retrying once after a rate limit.
    pub async fn send(&self, destination: &str, text: &str) -> Result<DeliveryReport, DeliveryError> {
        metrics::counter!("chanwatch_deliveries_total").increment(1);

        let retry_after = match self.transport.send(destination, text).await {
            Ok(()) => {
                return Ok(DeliveryReport {
                    attempts: 1,
                    waited: Duration::ZERO,
                });
            },
            Err(TransportError::RateLimited { retry_after }) => retry_after,
            Err(source) => return Err(Self::give_up(destination, 1, source)),
        };

        metrics::counter!("chanwatch_rate_limited_total").increment(1);
        tracing::warn!(
            destination,
            wait_secs = retry_after.as_secs(),
            "Rate limited by transport; waiting before the single retry"
        );
        self.wait(retry_after).await?;

        match self.transport.send(destination, text).await {
            Ok(()) => Ok(DeliveryReport {
                attempts: 2,
                waited: retry_after,
            }),
            Err(TransportError::RateLimited { retry_after: again }) => {
                metrics::counter!("chanwatch_delivery_failures_total").increment(1);
                tracing::error!(
                    destination,
                    waited_secs = retry_after.as_secs(),
                    retry_after_secs = again.as_secs(),
                    "Notification dropped: still rate limited after retry"
                );
                Err(DeliveryError::RateLimitedTwice {
                    waited: retry_after,
                    retry_after: again,
                })
            },
            Err(source) => Err(Self::give_up(destination, 2, source)),
        }
    }

    async fn wait(&self, duration: Duration) -> Result<(), DeliveryError> {
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.shutdown.cancelled() => {
                tracing::info!(wait_secs = duration.as_secs(), "Rate-limit wait interrupted by shutdown");
                Err(DeliveryError::Cancelled)
            },
        }
    }

    fn give_up(destination: &str, attempts: u32, source: TransportError) -> DeliveryError {
        metrics::counter!("chanwatch_delivery_failures_total").increment(1);
        tracing::error!(
            destination,
            attempts,
            error = %source,
            "Notification dropped: transport error"
        );
        DeliveryError::Transport { attempts, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use tokio::time::Instant;

    fn rate_limited(secs: u64) -> TransportError {
        TransportError::RateLimited {
            retry_after: Duration::from_secs(secs),
        }
    }

    fn delivery(transport: &Arc<MemoryTransport>) -> Delivery {
        Delivery::new(Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let transport = Arc::new(MemoryTransport::new());
        let report = delivery(&transport).send("@d", "hi").await.expect("deliver");

        assert_eq!(report.attempts, 1);
        assert_eq!(report.waited, Duration::ZERO);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_exactly_the_mandated_duration() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next(rate_limited(7));

        let start = Instant::now();
        let report = delivery(&transport).send("@d", "hi").await.expect("deliver");

        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(report.attempts, 2);
        assert_eq!(report.waited, Duration::from_secs(7));
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_rate_limit_gives_up() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next(rate_limited(2));
        transport.fail_next(rate_limited(5));

        let err = delivery(&transport).send("@d", "hi").await.expect_err("should fail");

        assert!(matches!(err, DeliveryError::RateLimitedTwice { .. }));
        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next(TransportError::Rejected {
            status: 400,
            description: "chat not found".to_string(),
        });

        let start = Instant::now();
        let err = delivery(&transport).send("@d", "hi").await.expect_err("should fail");

        assert!(matches!(err, DeliveryError::Transport { attempts: 1, .. }));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_wait() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next(rate_limited(600));
        let token = CancellationToken::new();
        let delivery = delivery(&transport).with_shutdown(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let start = Instant::now();
        let err = delivery.send("@d", "hi").await.expect_err("should be cancelled");
        canceller.await.expect("join canceller");

        assert!(matches!(err, DeliveryError::Cancelled));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(transport.attempts(), 1);
    }
}

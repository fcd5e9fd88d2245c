//! In-process transports.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A message accepted by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination it was sent to.
    pub destination: String,
    /// Notification text.
    pub text: String,
}

/// Transport that keeps sent messages in memory.
///
/// Failures queued with [`MemoryTransport::fail_next`] are returned by the
/// next send attempts, in order; once the queue is empty, sends succeed.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<TransportError>>,
    attempts: Mutex<usize>,
}

impl MemoryTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next unanswered send attempt.
    pub fn fail_next(&self, error: TransportError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Returns every accepted message, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of accepted messages.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of send attempts, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner) += 1;

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                destination: destination.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }
}

/// Transport that only logs what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        tracing::info!(destination, notification = text, "Dry run: notification not sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let transport = MemoryTransport::new();
        transport.fail_next(TransportError::RateLimited {
            retry_after: Duration::from_secs(3),
        });

        let first = transport.send("@dest", "one").await;
        assert_eq!(
            first.err().and_then(|e| e.retry_after()),
            Some(Duration::from_secs(3))
        );

        transport.send("@dest", "two").await.expect("send");
        assert_eq!(transport.attempts(), 2);
        assert_eq!(
            transport.sent(),
            vec![SentMessage {
                destination: "@dest".to_string(),
                text: "two".to_string(),
            }]
        );
    }
}

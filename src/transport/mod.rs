//! Outbound transport: "send this text to that destination".
//!
//! Implementations:
//! - [`crate::telegram::BotApiTransport`]: Telegram Bot API `sendMessage`
//! - [`MemoryTransport`]: records sends, replays scripted failures
//! - [`DryRunTransport`]: logs notifications instead of sending them

mod memory;

pub use memory::{DryRunTransport, MemoryTransport, SentMessage};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport asked the caller to wait before sending again.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Wait mandated by the transport.
        retry_after: Duration,
    },

    /// The transport refused the request (bad destination, bad token, ...).
    #[error("rejected ({status}): {description}")]
    Rejected {
        /// Status or error code reported by the transport.
        status: u16,
        /// Human-readable reason.
        description: String,
    },

    /// The request did not reach the transport or got no usable answer.
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Returns the mandated wait if this is a rate-limit signal.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Sends text to a destination chat.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `text` to `destination`.
    async fn send(&self, destination: &str, text: &str) -> Result<(), TransportError>;
}

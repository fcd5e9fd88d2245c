//! # Chanwatch
//!
//! Watches a set of message channels for keywords and forwards every match
//! to a destination chat.
//!
//! The crate is built around a match-and-deliver engine:
//!
//! - [`matching`] compiles keywords into whole-word, case-insensitive
//!   matchers and formats match notifications
//! - [`dedup`] keeps a bounded, persisted set of already-forwarded messages
//! - [`delivery`] sends notifications, waiting out a rate limit once
//! - [`engine`] runs the startup backfill and the live feed through the
//!   same per-message pipeline
//!
//! Feeds ([`feed`]) and transports ([`transport`]) are collaborators behind
//! traits; [`telegram`] provides Bot API implementations of both, and
//! [`factory`] picks the ones a run uses.
//!
//! ## Example
//!
//! ```rust,ignore
//! use chanwatch::{Deduplicator, Engine, EngineConfig, PatternSet};
//!
//! let patterns = PatternSet::compile(["urgent", "sale"]);
//! let dedup = Deduplicator::load(store, 10_000, EvictionPolicy::Reset)?;
//! let mut engine = Engine::new(EngineConfig::new("@alerts", channels), patterns, dedup, transport)?;
//! let stats = engine.run(&feed, true).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod dedup;
pub mod delivery;
pub mod engine;
pub mod factory;
pub mod feed;
pub mod matching;
pub mod models;
pub mod observability;
pub mod telegram;
pub mod transport;

pub use config::WatchConfig;
pub use dedup::{Deduplicator, EvictionPolicy, FileSentStore, MemorySentStore, SentStore};
pub use delivery::{Delivery, DeliveryError, DeliveryReport};
pub use engine::{Engine, EngineConfig, EngineStats, Outcome, Phase};
pub use factory::RunFactory;
pub use feed::{Feed, JsonLinesFeed, MemoryFeed};
pub use matching::{MatchResult, Origin, PatternSet, format_notification};
pub use models::{ChannelId, DeliveryKey, Message, MessageId};
pub use transport::{MemoryTransport, Transport, TransportError};

/// Error type for chanwatch operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Config` | Destination, keywords or channels missing; unreadable config |
/// | `SourceAccess` | A channel's history cannot be fetched |
/// | `OperationFailed` | I/O on the sent-message store, feed plumbing, logging setup |
/// | `Cancelled` | Shutdown was requested while the engine was waiting |
///
/// Only `Config` stops the engine from starting. Everything else is
/// reported per channel or per message and the engine keeps going. A
/// failed notification is a [`DeliveryError`] and ends up as
/// [`Outcome::Failed`]; it never becomes an `Error`.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The configuration is incomplete or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source channel could not be resolved or fetched.
    #[error("channel '{channel}' unavailable: {cause}")]
    SourceAccess {
        /// The configured channel identifier.
        channel: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Shutdown was requested.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for [`Error::OperationFailed`].
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for chanwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

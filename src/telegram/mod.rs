//! Telegram Bot API adapters.
//!
//! [`BotApiClient`] wraps the HTTP calls; [`BotApiTransport`] and
//! [`BotApiFeed`] plug it into the engine's [`crate::Transport`] and
//! [`crate::Feed`] seams.

mod client;
mod feed;
mod transport;

pub use client::{BotApiClient, BotUser, DEFAULT_API_BASE};
pub use feed::BotApiFeed;
pub use transport::BotApiTransport;

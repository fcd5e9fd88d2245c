//! Inbound feed: channel history for the backfill, a subscription for live
//! messages.
//!
//! A subscription is a bounded [`mpsc::Receiver`] filled by a producer task
//! the feed spawns. The engine subscribes before it starts the backfill, so
//! anything posted while the backfill runs waits in the channel and is
//! processed afterwards, in arrival order. The feed disconnects by dropping
//! its sender.
//!
//! Implementations:
//! - [`crate::telegram::BotApiFeed`]: Bot API long polling (live only)
//! - [`JsonLinesFeed`]: per-channel JSON-lines archives plus a line stream
//! - [`MemoryFeed`]: in-process, for tests

mod jsonl;
mod memory;

pub use jsonl::JsonLinesFeed;
pub use memory::MemoryFeed;

use crate::Result;
use crate::models::{ChannelId, Message};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capacity of a live subscription channel.
pub const LIVE_BUFFER: usize = 1024;

/// Source of channel messages.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Fetches up to `limit` of the most recent messages of `channel`.
    ///
    /// Fails with [`crate::Error::SourceAccess`] when the channel cannot be
    /// resolved or read.
    async fn fetch_recent(&self, channel: &ChannelId, limit: usize) -> Result<Vec<Message>>;

    /// Starts delivering new messages posted to `channels`.
    async fn subscribe(&self, channels: &[ChannelId]) -> Result<mpsc::Receiver<Message>>;
}

/// Sorts newest first and keeps at most `limit` messages.
pub(crate) fn most_recent(mut messages: Vec<Message>, limit: usize) -> Vec<Message> {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    messages.truncate(limit);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_most_recent_orders_and_limits() {
        let now = Utc::now();
        let messages = vec![
            Message::new("c", 1, now - Duration::minutes(3), "old"),
            Message::new("c", 3, now, "new"),
            Message::new("c", 2, now - Duration::minutes(1), "mid"),
        ];

        let ids: Vec<i64> = most_recent(messages, 2).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }
}

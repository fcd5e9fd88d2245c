//! In-process feed.

use super::{Feed, LIVE_BUFFER, most_recent};
use crate::models::{ChannelId, Message};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Feed backed by in-memory history and a live queue.
///
/// Live messages pushed with [`MemoryFeed::push_live`] are delivered to the
/// subscription in push order, filtered to the subscribed channels. The
/// subscription ends after [`MemoryFeed::disconnect`].
pub struct MemoryFeed {
    history: HashMap<ChannelId, Vec<Message>>,
    unavailable: HashSet<ChannelId>,
    sender: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

impl MemoryFeed {
    /// Creates a feed with no history.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            history: HashMap::new(),
            unavailable: HashSet::new(),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Adds history for a channel.
    #[must_use]
    pub fn with_history(mut self, channel: impl Into<ChannelId>, messages: Vec<Message>) -> Self {
        self.history.entry(channel.into()).or_default().extend(messages);
        self
    }

    /// Makes history fetches for `channel` fail.
    #[must_use]
    pub fn with_unavailable(mut self, channel: impl Into<ChannelId>) -> Self {
        self.unavailable.insert(channel.into());
        self
    }

    /// Queues a live message. Returns false after [`MemoryFeed::disconnect`].
    pub fn push_live(&self, message: Message) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|sender| sender.send(message).is_ok())
    }

    /// Ends the live stream once queued messages are consumed.
    pub fn disconnect(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Feed for MemoryFeed {
    async fn fetch_recent(&self, channel: &ChannelId, limit: usize) -> Result<Vec<Message>> {
        if self.unavailable.contains(channel) {
            return Err(Error::SourceAccess {
                channel: channel.to_string(),
                cause: "channel not found".to_string(),
            });
        }
        let messages = self.history.get(channel).cloned().unwrap_or_default();
        Ok(most_recent(messages, limit))
    }

    async fn subscribe(&self, channels: &[ChannelId]) -> Result<mpsc::Receiver<Message>> {
        let mut source = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::operation("subscribe", "memory feed already subscribed"))?;

        let wanted: HashSet<ChannelId> = channels.iter().cloned().collect();
        let (tx, rx) = mpsc::channel(LIVE_BUFFER);
        tokio::spawn(async move {
            while let Some(message) = source.recv().await {
                if !wanted.contains(&message.channel) {
                    continue;
                }
                if tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_live_messages_filtered_by_channel() {
        let feed = MemoryFeed::new();
        feed.push_live(Message::new("a", 1, Utc::now(), "x"));
        feed.push_live(Message::new("b", 2, Utc::now(), "y"));
        feed.push_live(Message::new("a", 3, Utc::now(), "z"));
        feed.disconnect();

        let mut rx = feed.subscribe(&[ChannelId::new("a")]).await.expect("subscribe");
        let mut ids = Vec::new();
        while let Some(message) = rx.recv().await {
            ids.push(message.id);
        }
        assert_eq!(ids, vec![1, 3]);
        assert!(!feed.push_live(Message::new("a", 4, Utc::now(), "late")));
    }

    #[tokio::test]
    async fn test_unavailable_channel() {
        let feed = MemoryFeed::new().with_unavailable("gone");
        let err = feed
            .fetch_recent(&ChannelId::new("gone"), 10)
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::SourceAccess { .. }));
    }

    #[tokio::test]
    async fn test_second_subscription_rejected() {
        let feed = MemoryFeed::new();
        let _rx = feed.subscribe(&[]).await.expect("subscribe");
        assert!(feed.subscribe(&[]).await.is_err());
    }
}

//! `getUpdates` long-polling feed.

use super::BotApiClient;
use crate::feed::{Feed, LIVE_BUFFER};
use crate::models::{ChannelId, Message};
use crate::transport::TransportError;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pause after a failed poll.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Extra HTTP budget on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    channel_post: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    message_id: i64,
    date: i64,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl Chat {
    /// Finds the configured channel this chat corresponds to.
    ///
    /// Channels are configured either by numeric chat id or by `@username`.
    fn resolve<'a>(&self, channels: &'a [ChannelId]) -> Option<&'a ChannelId> {
        let id = self.id.to_string();
        channels.iter().find(|channel| {
            let configured = channel.as_str();
            configured == id
                || self.username.as_deref().is_some_and(|username| {
                    configured
                        .trim_start_matches('@')
                        .eq_ignore_ascii_case(username)
                })
        })
    }
}

impl ChatMessage {
    fn into_message(self, channel: ChannelId) -> Message {
        let timestamp = DateTime::from_timestamp(self.date, 0).unwrap_or_else(Utc::now);
        Message {
            channel,
            channel_title: self.chat.title,
            id: self.message_id,
            timestamp,
            text: self.text.or(self.caption),
        }
    }
}

/// Extracts the subscribed messages from a batch of updates.
///
/// Posts dated before `not_before` (unix seconds) are confirmed but dropped.
/// Returns the messages and the next `getUpdates` offset.
fn collect_updates(
    updates: Vec<Update>,
    channels: &[ChannelId],
    offset: i64,
    not_before: i64,
) -> (Vec<Message>, i64) {
    let mut next = offset;
    let mut messages = Vec::new();
    for update in updates {
        next = next.max(update.update_id + 1);
        let Some(post) = update.channel_post.or(update.message) else {
            continue;
        };
        if post.date < not_before {
            tracing::debug!(update_id = update.update_id, "Dropping queued update older than the backlog window");
            continue;
        }
        if let Some(channel) = post.chat.resolve(channels) {
            let channel = channel.clone();
            messages.push(post.into_message(channel));
        }
    }
    (messages, next)
}

/// Live feed over Bot API long polling.
///
/// The bot must be a member of each watched channel. The Bot API has no
/// history endpoint, so [`Feed::fetch_recent`] always fails and the backfill
/// skips every channel.
///
/// Telegram queues unconfirmed updates for up to a day. On subscribe, queued
/// posts older than the backlog window are discarded; the default window is
/// zero, so only posts from the subscription onward are forwarded.
#[derive(Debug, Clone)]
pub struct BotApiFeed {
    client: Arc<BotApiClient>,
    poll_timeout: Duration,
    backlog_window: Duration,
    shutdown: CancellationToken,
}

impl BotApiFeed {
    /// Creates a feed polling with the given long-poll timeout.
    #[must_use]
    pub fn new(client: Arc<BotApiClient>, poll_timeout: Duration) -> Self {
        Self {
            client,
            poll_timeout,
            backlog_window: Duration::ZERO,
            shutdown: CancellationToken::new(),
        }
    }

    /// Accepts queued posts up to `window` older than the subscription.
    #[must_use]
    pub const fn with_backlog_window(mut self, window: Duration) -> Self {
        self.backlog_window = window;
        self
    }

    /// Earliest post date, in unix seconds, accepted from a subscription
    /// opened at `now`.
    fn not_before(&self, now: DateTime<Utc>) -> i64 {
        let window = i64::try_from(self.backlog_window.as_secs()).unwrap_or(i64::MAX);
        now.timestamp().saturating_sub(window)
    }

    /// Stops polling when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    async fn poll_loop(self, channels: Vec<ChannelId>, not_before: i64, tx: mpsc::Sender<Message>) {
        let mut offset = 0_i64;
        let http_timeout = self.poll_timeout + POLL_GRACE;

        loop {
            let params = GetUpdates {
                offset,
                timeout: self.poll_timeout.as_secs(),
                allowed_updates: &["message", "channel_post"],
            };

            let result = tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tx.closed() => break,
                result = self.client.call::<_, Vec<Update>>("getUpdates", &params, Some(http_timeout)) => result,
            };

            let backoff = match result {
                Ok(updates) => {
                    let (messages, next) = collect_updates(updates, &channels, offset, not_before);
                    offset = next;
                    for message in messages {
                        if tx.send(message).await.is_err() {
                            return;
                        }
                    }
                    continue;
                },
                Err(TransportError::RateLimited { retry_after }) => {
                    tracing::warn!(wait_secs = retry_after.as_secs(), "getUpdates rate limited");
                    retry_after
                },
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    ERROR_BACKOFF
                },
            };

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(backoff) => {},
            }
        }

        tracing::info!("Bot API polling stopped");
    }
}

#[async_trait]
impl Feed for BotApiFeed {
    async fn fetch_recent(&self, channel: &ChannelId, _limit: usize) -> Result<Vec<Message>> {
        Err(Error::SourceAccess {
            channel: channel.to_string(),
            cause: "the Bot API does not expose channel history".to_string(),
        })
    }

    async fn subscribe(&self, channels: &[ChannelId]) -> Result<mpsc::Receiver<Message>> {
        let (tx, rx) = mpsc::channel(LIVE_BUFFER);
        let not_before = self.not_before(Utc::now());
        tokio::spawn(self.clone().poll_loop(channels.to_vec(), not_before, tx));
        Ok(rx)
    }
}

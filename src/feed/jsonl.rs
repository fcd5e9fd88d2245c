//! JSON-lines feed.
//!
//! History lives in `<archive_dir>/<channel>.jsonl`, one message per line:
//!
//! ```text
//! {"id": 41, "timestamp": "2024-05-01T09:58:00Z", "text": "restock on friday"}
//! {"id": 42, "timestamp": "2024-05-01T10:00:00Z", "text": "URGENT sale", "channel_title": "Shop"}
//! ```
//!
//! Live messages are read line by line from any async reader (stdin in the
//! binary) and must carry their `channel`. The stream disconnects at EOF.

use super::{Feed, LIVE_BUFFER, most_recent};
use crate::models::{ChannelId, Message, MessageId};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

type LiveReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// One line of an archive or live stream.
#[derive(Debug, Deserialize)]
struct Line {
    #[serde(default)]
    channel: Option<ChannelId>,
    #[serde(default)]
    channel_title: Option<String>,
    id: MessageId,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    text: Option<String>,
}

impl Line {
    fn into_message(self, fallback_channel: Option<&ChannelId>) -> Option<Message> {
        let channel = self.channel.or_else(|| fallback_channel.cloned())?;
        Some(Message {
            channel,
            channel_title: self.channel_title,
            id: self.id,
            timestamp: self.timestamp,
            text: self.text,
        })
    }
}

/// Feed reading JSON-lines archives and a live line stream.
#[derive(Default)]
pub struct JsonLinesFeed {
    archive_dir: Option<PathBuf>,
    live: Mutex<Option<LiveReader>>,
}

impl JsonLinesFeed {
    /// Creates a feed with neither history nor live stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads channel history from `dir`.
    #[must_use]
    pub fn with_archive(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Reads live messages from `reader`.
    #[must_use]
    pub fn with_live<R>(self, reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(reader));
        self
    }

    /// Returns the archive file for `channel`.
    #[must_use]
    pub fn archive_path(dir: &Path, channel: &ChannelId) -> PathBuf {
        let name: String = channel
            .as_str()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '@' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        dir.join(format!("{name}.jsonl"))
    }
}

fn parse_line(raw: &str, fallback_channel: Option<&ChannelId>) -> Option<Message> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Line>(raw) {
        Ok(line) => {
            let message = line.into_message(fallback_channel);
            if message.is_none() {
                tracing::warn!("Skipping feed line without a channel");
            }
            message
        },
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed feed line");
            None
        },
    }
}

#[async_trait]
impl Feed for JsonLinesFeed {
    async fn fetch_recent(&self, channel: &ChannelId, limit: usize) -> Result<Vec<Message>> {
        let Some(dir) = &self.archive_dir else {
            return Err(Error::SourceAccess {
                channel: channel.to_string(),
                cause: "no archive directory configured".to_string(),
            });
        };

        let path = Self::archive_path(dir, channel);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::SourceAccess {
                channel: channel.to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        let messages = contents
            .lines()
            .filter_map(|line| parse_line(line, Some(channel)))
            .filter(|message| &message.channel == channel)
            .collect();
        Ok(most_recent(messages, limit))
    }

    async fn subscribe(&self, channels: &[ChannelId]) -> Result<mpsc::Receiver<Message>> {
        let (tx, rx) = mpsc::channel(LIVE_BUFFER);
        let Some(reader) = self.live.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            tracing::debug!("JSON-lines feed has no live stream");
            return Ok(rx);
        };

        let wanted: HashSet<ChannelId> = channels.iter().cloned().collect();
        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(message) = parse_line(&line, None) else {
                            continue;
                        };
                        if !wanted.contains(&message.channel) {
                            continue;
                        }
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    },
                    Ok(None) => {
                        tracing::info!("Live feed reached end of input");
                        break;
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "Live feed read failed");
                        break;
                    },
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_history_newest_first() {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::write(
            dir.path().join("@shop.jsonl"),
            concat!(
                r#"{"id": 1, "timestamp": "2024-05-01T09:00:00Z", "text": "first"}"#, "\n",
                "not json\n",
                "\n",
                r#"{"id": 2, "timestamp": "2024-05-01T10:00:00Z", "text": "second"}"#, "\n",
            ),
        )
        .expect("write archive");

        let feed = JsonLinesFeed::new().with_archive(dir.path());
        let messages = feed
            .fetch_recent(&ChannelId::new("@shop"), 100)
            .await
            .expect("fetch");

        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(messages.iter().all(|m| m.channel.as_str() == "@shop"));
    }

    #[tokio::test]
    async fn test_missing_archive_is_source_access_error() {
        let dir = TempDir::new().expect("create temp dir");
        let feed = JsonLinesFeed::new().with_archive(dir.path());

        let err = feed
            .fetch_recent(&ChannelId::new("@nowhere"), 10)
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::SourceAccess { ref channel, .. } if channel == "@nowhere"));
    }

    #[tokio::test]
    async fn test_live_stream_filters_and_disconnects_at_eof() {
        let input = concat!(
            r#"{"channel": "@a", "id": 1, "timestamp": "2024-05-01T10:00:00Z", "text": "one"}"#, "\n",
            r#"{"channel": "@b", "id": 2, "timestamp": "2024-05-01T10:00:00Z", "text": "two"}"#, "\n",
            r#"{"id": 3, "timestamp": "2024-05-01T10:00:00Z", "text": "no channel"}"#, "\n",
            r#"{"channel": "@a", "id": 4, "timestamp": "2024-05-01T10:01:00Z"}"#, "\n",
        );
        let feed = JsonLinesFeed::new().with_live(tokio::io::BufReader::new(input.as_bytes()));

        let mut rx = feed.subscribe(&[ChannelId::new("@a")]).await.expect("subscribe");
        let mut received = Vec::new();
        while let Some(message) = rx.recv().await {
            received.push((message.id, message.text));
        }

        assert_eq!(received, vec![(1, Some("one".to_string())), (4, None)]);
    }

    #[test]
    fn test_archive_path_sanitizes_separators() {
        let path = JsonLinesFeed::archive_path(Path::new("/data"), &ChannelId::new("a/b:c"));
        assert_eq!(path, PathBuf::from("/data/a_b_c.jsonl"));
    }
}

//! Channel messages as observed by the engine.

use super::DeliveryKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message identifier, unique within one channel.
pub type MessageId = i64;

/// Identifier of a source channel as written in the configuration.
///
/// This is whatever the feed understands: a numeric chat id, an `@username`,
/// or an archive name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Creates a new channel ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A message posted to a watched channel.
///
/// The engine only ever reads these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Channel the message was posted to.
    pub channel: ChannelId,
    /// Human-readable channel title, used in notification headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    /// Message identifier within the channel.
    pub id: MessageId,
    /// When the message was posted.
    pub timestamp: DateTime<Utc>,
    /// Message text. Media posts without a caption have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    /// Creates a text message.
    #[must_use]
    pub fn new(
        channel: impl Into<ChannelId>,
        id: MessageId,
        timestamp: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            channel_title: None,
            id,
            timestamp,
            text: Some(text.into()),
        }
    }

    /// Sets the channel title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.channel_title = Some(title.into());
        self
    }

    /// Returns the message text, or an empty string when there is none.
    #[must_use]
    pub fn body(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Returns the name used for the channel in notifications.
    #[must_use]
    pub fn channel_label(&self) -> &str {
        self.channel_title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| self.channel.as_str())
    }

    /// Returns the deduplication key for this message.
    #[must_use]
    pub fn delivery_key(&self) -> DeliveryKey {
        DeliveryKey::new(&self.channel, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_channel_label_prefers_title() {
        let msg = Message::new("@deals", 7, at(0), "hi").with_title("Deals & Steals");
        assert_eq!(msg.channel_label(), "Deals & Steals");

        let msg = Message::new("@deals", 7, at(0), "hi").with_title("  ");
        assert_eq!(msg.channel_label(), "@deals");
    }

    #[test]
    fn test_body_of_media_post_is_empty() {
        let mut msg = Message::new("@deals", 7, at(0), "hi");
        msg.text = None;
        assert_eq!(msg.body(), "");
    }

    #[test]
    fn test_message_json_shape() {
        let json = r#"{"channel":"@deals","id":42,"timestamp":"2024-05-01T10:00:00Z","text":"sale"}"#;
        let msg: Message = serde_json::from_str(json).expect("parse message");

        assert_eq!(msg.channel, ChannelId::new("@deals"));
        assert_eq!(msg.id, 42);
        assert_eq!(msg.body(), "sale");
        assert!(msg.channel_title.is_none());
    }
}

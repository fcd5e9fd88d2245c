//! Deduplication identity of a forwarded message.

use super::{ChannelId, MessageId};
use std::fmt;

/// `"<channel_id>:<message_id>"`, the identity under which a delivery is
/// recorded.
///
/// Message ids are integers, so the last `:` always separates the two
/// parts. Channel ids may contain `:` themselves and two different
/// `(channel, message)` pairs still never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryKey(String);

impl DeliveryKey {
    /// Builds the key for a message.
    #[must_use]
    pub fn new(channel: &ChannelId, message: MessageId) -> Self {
        Self(format!("{channel}:{message}"))
    }

    /// Returns the serialized key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a serialized key back into its channel and message id.
    ///
    /// Returns `None` for lines that were not produced by [`DeliveryKey::new`].
    #[must_use]
    pub fn parse(raw: &str) -> Option<(ChannelId, MessageId)> {
        let (channel, message) = raw.rsplit_once(':')?;
        let message = message.parse().ok()?;
        Some((ChannelId::new(channel), message))
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeliveryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = DeliveryKey::new(&ChannelId::new("-1001234"), 55);
        assert_eq!(key.as_str(), "-1001234:55");
    }

    #[test]
    fn test_parse_uses_last_separator() {
        let key = DeliveryKey::new(&ChannelId::new("archive:2024"), 9);
        let (channel, id) = DeliveryKey::parse(key.as_str()).expect("parse key");
        assert_eq!(channel.as_str(), "archive:2024");
        assert_eq!(id, 9);
    }

    #[test]
    fn test_parse_rejects_foreign_lines() {
        assert!(DeliveryKey::parse("no-separator").is_none());
        assert!(DeliveryKey::parse("chan:not-a-number").is_none());
    }
}

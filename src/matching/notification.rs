//! Notification text for a matched message.

use super::scanner::MatchResult;
use crate::models::Message;

/// Characters of message text kept in a notification.
pub const MAX_BODY_CHARS: usize = 1000;

/// Appended after the (possibly truncated) message text.
pub const TRUNCATION_MARKER: &str = "...";

/// Where a matched message came from. Only changes the header wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Found by the startup scan of recent history.
    Backfill,
    /// Arrived on the live feed.
    Live,
}

impl Origin {
    const fn lead_in(self) -> &'static str {
        match self {
            Self::Backfill => "🔎 Found keywords in",
            Self::Live => "📢 Match found in",
        }
    }
}

/// Formats the notification sent for a matched message.
///
/// ```text
/// 📢 Match found in <channel>: urgent, sale (2)
/// 📝 Message:
/// <first 1000 characters of the text>...
/// ```
#[must_use]
pub fn format_notification(message: &Message, matches: &MatchResult, origin: Origin) -> String {
    format!(
        "{} {}: {}\n📝 Message:\n{}{}",
        origin.lead_in(),
        message.channel_label(),
        matches.summary(),
        truncate_chars(message.body(), MAX_BODY_CHARS),
        TRUNCATION_MARKER,
    )
}

/// Returns the first `max` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(end, _)| &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::PatternSet;
    use chrono::Utc;

    #[test]
    fn test_live_notification_layout() {
        let set = PatternSet::compile(["urgent", "sale"]);
        let msg = Message::new("@shop", 1, Utc::now(), "Urgent sale! sale ends today")
            .with_title("Shop News");
        let result = set.scan(msg.body());

        let text = format_notification(&msg, &result, Origin::Live);
        assert_eq!(
            text,
            "📢 Match found in Shop News: urgent, sale (2)\n📝 Message:\nUrgent sale! sale ends today..."
        );
    }

    #[test]
    fn test_backfill_header_falls_back_to_channel_id() {
        let set = PatternSet::compile(["urgent"]);
        let msg = Message::new("@shop", 1, Utc::now(), "urgent");
        let text = format_notification(&msg, &set.scan(msg.body()), Origin::Backfill);
        assert!(text.starts_with("🔎 Found keywords in @shop: urgent\n"));
    }

    #[test]
    fn test_long_text_is_cut_at_character_limit() {
        let set = PatternSet::compile(["ё"]);
        let body = format!("ё {}", "ж".repeat(2000));
        let msg = Message::new("@c", 1, Utc::now(), body);
        let text = format_notification(&msg, &set.scan(msg.body()), Origin::Live);

        let kept = text.split("📝 Message:\n").nth(1).unwrap_or_default();
        assert_eq!(kept.chars().count(), MAX_BODY_CHARS + TRUNCATION_MARKER.len());
        assert!(kept.ends_with("ж..."));
    }

    #[test]
    fn test_truncate_chars_short_text_untouched() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}

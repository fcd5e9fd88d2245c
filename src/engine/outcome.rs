//! Per-message outcomes and run statistics.

use std::fmt;

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Backfill message older than the lookback window.
    Stale,
    /// Already forwarded.
    Duplicate,
    /// No keyword matched.
    NoMatch,
    /// Forwarded and recorded.
    Delivered,
    /// Matched but the notification was not delivered.
    Failed,
}

impl Outcome {
    /// Returns the metric label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Duplicate => "duplicate",
            Self::NoMatch => "no_match",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters accumulated over an engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Messages processed.
    pub processed: u64,
    /// Skipped as too old.
    pub stale: u64,
    /// Skipped as already forwarded.
    pub duplicate: u64,
    /// Scanned without a match.
    pub no_match: u64,
    /// Forwarded.
    pub delivered: u64,
    /// Matched but not forwarded.
    pub failed: u64,
    /// Channels whose history could not be fetched.
    pub unavailable_channels: u64,
}

impl EngineStats {
    /// Counts one outcome.
    pub const fn record(&mut self, outcome: Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Stale => self.stale += 1,
            Outcome::Duplicate => self.duplicate += 1,
            Outcome::NoMatch => self.no_match += 1,
            Outcome::Delivered => self.delivered += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut stats = EngineStats::default();
        stats.record(Outcome::Delivered);
        stats.record(Outcome::Duplicate);
        stats.record(Outcome::Delivered);

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.duplicate, 1);
        assert_eq!(stats.failed, 0);
    }
}

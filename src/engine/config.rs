//! Engine parameters.

use crate::models::ChannelId;
use crate::{Error, Result};
use std::time::Duration;

/// Default backfill lookback window.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(12 * 60 * 60);

/// Default number of recent messages fetched per channel.
pub const DEFAULT_BACKFILL_LIMIT: usize = 100;

/// Default pause after each backfill delivery.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Immutable parameters of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Chat that receives notifications.
    pub destination: String,
    /// Channels to watch, in backfill order.
    pub channels: Vec<ChannelId>,
    /// Backfill only considers messages newer than this.
    pub lookback: Duration,
    /// Messages fetched per channel during backfill.
    pub backfill_limit: usize,
    /// Pause after each successful backfill delivery.
    pub pacing: Duration,
    /// Send a startup message listing the watched channels.
    pub announce_startup: bool,
}

impl EngineConfig {
    /// Creates a configuration with default timings.
    #[must_use]
    pub fn new<I, C>(destination: impl Into<String>, channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
    {
        Self {
            destination: destination.into(),
            channels: channels.into_iter().map(Into::into).collect(),
            lookback: DEFAULT_LOOKBACK,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
            pacing: DEFAULT_PACING,
            announce_startup: true,
        }
    }

    /// Sets the lookback window.
    #[must_use]
    pub const fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Sets the per-channel backfill limit.
    #[must_use]
    pub const fn with_backfill_limit(mut self, limit: usize) -> Self {
        self.backfill_limit = limit;
        self
    }

    /// Sets the pause after backfill deliveries.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Enables or disables the startup announcement.
    #[must_use]
    pub const fn with_announce_startup(mut self, announce: bool) -> Self {
        self.announce_startup = announce;
        self
    }

    /// Checks that the engine can run with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(Error::Config("destination is missing".to_string()));
        }
        if self.channels.is_empty() {
            return Err(Error::Config("no channels to watch".to_string()));
        }
        if let Some(blank) = self.channels.iter().position(|c| c.as_str().trim().is_empty()) {
            return Err(Error::Config(format!("channel #{} is blank", blank + 1)));
        }
        if chrono::Duration::from_std(self.lookback).is_err() {
            return Err(Error::Config(format!(
                "lookback of {}s is out of range",
                self.lookback.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new("@alerts", ["@a"]);
        assert_eq!(config.lookback, Duration::from_secs(43_200));
        assert_eq!(config.backfill_limit, 100);
        assert_eq!(config.pacing, Duration::from_secs(1));
        assert!(config.announce_startup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_destination() {
        let config = EngineConfig::new("  ", ["@a"]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_channels() {
        let config = EngineConfig::new("@alerts", Vec::<String>::new());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_channel() {
        let config = EngineConfig::new("@alerts", ["@a", " "]);
        let err = config.validate().expect_err("blank channel");
        assert_eq!(err.to_string(), "configuration error: channel #2 is blank");
    }
}

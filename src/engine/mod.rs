//! The match-and-deliver engine.
//!
//! # Pipeline
//!
//! ```text
//! Message --> recency (backfill only) --> dedup --> scan --> deliver --> record
//!                 |                          |        |          |
//!                 v                          v        v          v
//!               Stale                  Duplicate   NoMatch     Failed
//! ```
//!
//! # Run
//!
//! 1. Subscribe to the live feed (new messages queue from here on)
//! 2. Announce the watched channels (optional)
//! 3. Backfill: recent history of each channel, pacing deliveries
//! 4. Follow the live feed until it disconnects or shutdown is requested
//!
//! One task processes every message to completion before the next. The
//! engine owns the [`Deduplicator`], so check-then-record needs no lock.

mod config;
mod outcome;

pub use config::{DEFAULT_BACKFILL_LIMIT, DEFAULT_LOOKBACK, DEFAULT_PACING, EngineConfig};
pub use outcome::{EngineStats, Outcome};

use crate::dedup::Deduplicator;
use crate::delivery::Delivery;
use crate::feed::Feed;
use crate::matching::{Origin, PatternSet, format_notification, scan};
use crate::models::{ChannelId, Message};
use crate::transport::Transport;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Processing phase of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Startup scan; messages at or before `cutoff` are stale.
    Backfill {
        /// Oldest excluded timestamp.
        cutoff: DateTime<Utc>,
    },
    /// Live feed; no recency filter.
    Live,
}

impl Phase {
    /// Backfill phase for a lookback window ending at `now`.
    #[must_use]
    pub fn backfill(now: DateTime<Utc>, lookback: chrono::Duration) -> Self {
        Self::Backfill {
            cutoff: now - lookback,
        }
    }

    /// Notification wording for this phase.
    #[must_use]
    pub const fn origin(self) -> Origin {
        match self {
            Self::Backfill { .. } => Origin::Backfill,
            Self::Live => Origin::Live,
        }
    }
}

/// Returns true if `timestamp` is strictly newer than `cutoff`.
#[must_use]
pub fn is_within_lookback(timestamp: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    timestamp > cutoff
}

/// Text of the startup announcement.
#[must_use]
pub fn startup_announcement(channels: &[ChannelId]) -> String {
    let names: Vec<&str> = channels.iter().map(ChannelId::as_str).collect();
    format!("📡 Bot started. Monitoring channels: {}", names.join(", "))
}

/// Keyword watcher over a feed.
pub struct Engine {
    config: EngineConfig,
    patterns: PatternSet,
    dedup: Deduplicator,
    delivery: Delivery,
    shutdown: CancellationToken,
    stats: EngineStats,
}

impl Engine {
    /// Creates an engine.
    ///
    /// Fails with [`Error::Config`] if the configuration is incomplete or no
    /// keyword compiled.
    pub fn new(
        config: EngineConfig,
        patterns: PatternSet,
        dedup: Deduplicator,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        if patterns.is_empty() {
            return Err(Error::Config("no usable keywords".to_string()));
        }

        Ok(Self {
            config,
            patterns,
            dedup,
            delivery: Delivery::new(transport),
            shutdown: CancellationToken::new(),
            stats: EngineStats::default(),
        })
    }

    /// Stops the run, including pending waits, when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.delivery = self.delivery.with_shutdown(token.clone());
        self.shutdown = token;
        self
    }

    /// Returns the run parameters.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the counters so far.
    #[must_use]
    pub const fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Returns the sent-message set.
    #[must_use]
    pub const fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Runs backfill (when `backfill` is true) and then follows the live
    /// feed until it disconnects or shutdown is requested.
    ///
    /// Only a failed subscription is an error; per-channel and per-message
    /// failures are logged and counted.
    pub async fn run<F>(&mut self, feed: &F, backfill: bool) -> Result<EngineStats>
    where
        F: Feed + ?Sized,
    {
        let mut live = feed.subscribe(&self.config.channels).await?;
        tracing::info!(
            channels = self.config.channels.len(),
            keywords = self.patterns.len(),
            destination = %self.config.destination,
            "Engine started"
        );

        match self.drive(feed, &mut live, backfill).await {
            Ok(()) => {},
            Err(Error::Cancelled) => tracing::info!("Shutdown requested; engine stopping"),
            Err(e) => return Err(e),
        }

        self.log_stats("run");
        Ok(self.stats)
    }

    async fn drive<F>(
        &mut self,
        feed: &F,
        live: &mut mpsc::Receiver<Message>,
        backfill: bool,
    ) -> Result<()>
    where
        F: Feed + ?Sized,
    {
        if self.config.announce_startup {
            self.announce().await;
        }
        if backfill {
            self.backfill(feed).await?;
        }
        self.follow(live).await
    }

    async fn announce(&self) {
        let text = startup_announcement(&self.config.channels);
        match self.delivery.send(&self.config.destination, &text).await {
            Ok(_) => tracing::info!("Startup announcement sent"),
            Err(e) => tracing::warn!(error = %e, "Startup announcement not delivered"),
        }
    }

    /// Scans the recent history of every channel.
    ///
    /// A channel whose history cannot be fetched is logged and skipped.
    /// Returns [`Error::Cancelled`] if shutdown is requested.
    pub async fn backfill<F>(&mut self, feed: &F) -> Result<()>
    where
        F: Feed + ?Sized,
    {
        let lookback = chrono::Duration::from_std(self.config.lookback)
            .map_err(|e| Error::Config(format!("lookback out of range: {e}")))?;
        let phase = Phase::backfill(Utc::now(), lookback);
        let channels = self.config.channels.clone();

        for channel in &channels {
            if self.shutdown.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let messages = match feed.fetch_recent(channel, self.config.backfill_limit).await {
                Ok(messages) => messages,
                Err(e) => {
                    self.stats.unavailable_channels += 1;
                    metrics::counter!("chanwatch_unavailable_channels_total").increment(1);
                    tracing::warn!(channel = %channel, error = %e, "Skipping channel backfill");
                    continue;
                },
            };
            tracing::info!(channel = %channel, fetched = messages.len(), "Backfilling channel");

            for message in &messages {
                if self.process_message(message, phase).await == Outcome::Delivered {
                    self.pause().await?;
                }
                if self.shutdown.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }
        }

        self.log_stats("backfill");
        Ok(())
    }

    /// Processes live messages until the feed disconnects.
    ///
    /// Returns [`Error::Cancelled`] if shutdown is requested.
    pub async fn follow(&mut self, live: &mut mpsc::Receiver<Message>) -> Result<()> {
        tracing::info!("Listening for new messages");
        let shutdown = self.shutdown.clone();

        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => return Err(Error::Cancelled),
                next = live.recv() => next,
            };
            let Some(message) = next else {
                tracing::info!("Live feed disconnected");
                return Ok(());
            };
            self.process_message(&message, Phase::Live).await;
        }
    }

    /// Runs one message through the pipeline.
    pub async fn process_message(&mut self, message: &Message, phase: Phase) -> Outcome {
        let span = tracing::info_span!(
            "message",
            channel = %message.channel,
            message_id = message.id,
        );
        let outcome = self.evaluate(message, phase).instrument(span).await;

        self.stats.record(outcome);
        metrics::counter!("chanwatch_messages_total", "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    async fn evaluate(&mut self, message: &Message, phase: Phase) -> Outcome {
        if let Phase::Backfill { cutoff } = phase
            && !is_within_lookback(message.timestamp, cutoff)
        {
            tracing::trace!(timestamp = %message.timestamp, "Older than lookback window");
            return Outcome::Stale;
        }

        let key = message.delivery_key();
        if self.dedup.contains(&key) {
            tracing::debug!(key = %key, "Already forwarded");
            return Outcome::Duplicate;
        }

        let matches = scan(message.text.as_deref(), &self.patterns);
        if matches.is_empty() {
            return Outcome::NoMatch;
        }
        tracing::info!(keywords = %matches.summary(), "Keywords matched");

        let text = format_notification(message, &matches, phase.origin());
        match self.delivery.send(&self.config.destination, &text).await {
            Ok(report) => {
                if let Err(e) = self.dedup.record(&key) {
                    tracing::error!(key = %key, error = %e, "Failed to persist sent-message set");
                }
                #[allow(clippy::cast_precision_loss)]
                let remembered = self.dedup.len() as f64;
                metrics::gauge!("chanwatch_sent_set_size").set(remembered);
                tracing::info!(
                    attempts = report.attempts,
                    waited_secs = report.waited.as_secs(),
                    "Notification delivered"
                );
                Outcome::Delivered
            },
            Err(e) => {
                tracing::warn!(error = %e, "Notification not delivered; message left unrecorded");
                Outcome::Failed
            },
        }
    }

    async fn pause(&self) -> Result<()> {
        if self.config.pacing.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = tokio::time::sleep(self.config.pacing) => Ok(()),
            () = self.shutdown.cancelled() => Err(Error::Cancelled),
        }
    }

    fn log_stats(&self, phase: &str) {
        let stats = &self.stats;
        tracing::info!(
            phase,
            processed = stats.processed,
            delivered = stats.delivered,
            failed = stats.failed,
            duplicate = stats.duplicate,
            stale = stats.stale,
            no_match = stats.no_match,
            unavailable_channels = stats.unavailable_channels,
            "Engine statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{EvictionPolicy, MemorySentStore};
    use crate::transport::{MemoryTransport, TransportError};
    use chrono::Duration as ChronoDuration;

    fn engine_with(transport: Arc<MemoryTransport>) -> Engine {
        let dedup = Deduplicator::load(Arc::new(MemorySentStore::new()), 100, EvictionPolicy::Reset)
            .expect("load dedup");
        Engine::new(
            EngineConfig::new("@alerts", ["@shop"]).with_announce_startup(false),
            PatternSet::compile(["urgent", "sale"]),
            dedup,
            transport,
        )
        .expect("engine")
    }

    #[test]
    fn test_is_within_lookback_boundary() {
        let now = Utc::now();
        let cutoff = now - ChronoDuration::hours(12);
        assert!(!is_within_lookback(cutoff, cutoff));
        assert!(is_within_lookback(cutoff + ChronoDuration::seconds(1), cutoff));
        assert!(!is_within_lookback(cutoff - ChronoDuration::seconds(1), cutoff));
    }

    #[test]
    fn test_startup_announcement() {
        let channels = vec![ChannelId::new("@a"), ChannelId::new("@b")];
        assert_eq!(
            startup_announcement(&channels),
            "📡 Bot started. Monitoring channels: @a, @b"
        );
    }

    #[test]
    fn test_new_rejects_empty_patterns() {
        let dedup = Deduplicator::load(Arc::new(MemorySentStore::new()), 10, EvictionPolicy::Reset)
            .expect("load dedup");
        let result = Engine::new(
            EngineConfig::new("@alerts", ["@shop"]),
            PatternSet::compile(["  "]),
            dedup,
            Arc::new(MemoryTransport::new()),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_duplicate_is_not_resent() {
        let transport = Arc::new(MemoryTransport::new());
        let mut engine = engine_with(Arc::clone(&transport));
        let message = Message::new("@shop", 1, Utc::now(), "URGENT restock");

        assert_eq!(engine.process_message(&message, Phase::Live).await, Outcome::Delivered);
        assert_eq!(engine.process_message(&message, Phase::Live).await, Outcome::Duplicate);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_backfill_message_not_scanned() {
        let transport = Arc::new(MemoryTransport::new());
        let mut engine = engine_with(Arc::clone(&transport));
        let now = Utc::now();
        let phase = Phase::backfill(now, ChronoDuration::hours(12));

        let at_cutoff = Message::new("@shop", 1, now - ChronoDuration::hours(12), "urgent");
        let inside = Message::new(
            "@shop",
            2,
            now - ChronoDuration::hours(12) + ChronoDuration::seconds(1),
            "urgent",
        );

        assert_eq!(engine.process_message(&at_cutoff, phase).await, Outcome::Stale);
        assert_eq!(engine.process_message(&inside, phase).await, Outcome::Delivered);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_live_messages_skip_recency_filter() {
        let transport = Arc::new(MemoryTransport::new());
        let mut engine = engine_with(Arc::clone(&transport));
        let old = Message::new("@shop", 1, Utc::now() - ChronoDuration::days(30), "sale");

        assert_eq!(engine.process_message(&old, Phase::Live).await, Outcome::Delivered);
        assert!(transport.sent()[0].text.starts_with("📢 Match found in @shop: sale"));
    }

    #[tokio::test]
    async fn test_failed_delivery_leaves_key_unrecorded() {
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_next(TransportError::Rejected {
            status: 400,
            description: "chat not found".to_string(),
        });
        let mut engine = engine_with(Arc::clone(&transport));
        let message = Message::new("@shop", 9, Utc::now(), "urgent");

        assert_eq!(engine.process_message(&message, Phase::Live).await, Outcome::Failed);
        assert!(!engine.dedup().contains(&message.delivery_key()));

        assert_eq!(engine.process_message(&message, Phase::Live).await, Outcome::Delivered);
        assert_eq!(engine.stats().failed, 1);
        assert_eq!(engine.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_no_match_has_no_side_effects() {
        let transport = Arc::new(MemoryTransport::new());
        let mut engine = engine_with(Arc::clone(&transport));
        let message = Message::new("@shop", 3, Utc::now(), "nothing here");

        assert_eq!(engine.process_message(&message, Phase::Live).await, Outcome::NoMatch);
        assert_eq!(transport.attempts(), 0);
        assert!(engine.dedup().is_empty());
    }
}

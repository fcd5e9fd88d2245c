//! Collaborator selection for a watcher run.
//!
//! ```text
//! RunFactory
//!   ├── needs_bot()         → whether a Bot API client must be connected
//!   ├── create_sent_store() → Arc<dyn SentStore>
//!   ├── create_transport()  → Arc<dyn Transport>
//!   └── create_feed()       → Box<dyn Feed>
//! ```
//!
//! A dry run never writes the sent-message file: its keys are copied into
//! memory so duplicates are still skipped, and whatever the run records is
//! discarded on exit.

use crate::config::{DedupSettings, FeedKind, WatchConfig};
use crate::dedup::{FileSentStore, MemorySentStore, SentStore};
use crate::feed::{Feed, JsonLinesFeed};
use crate::telegram::{BotApiClient, BotApiFeed, BotApiTransport};
use crate::transport::{DryRunTransport, Transport};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

/// Builds the store, transport and feed of one `run`.
pub struct RunFactory;

impl RunFactory {
    /// Returns true if the run needs an authenticated Bot API client.
    ///
    /// Real deliveries always go through the Bot API; a dry run only needs
    /// it to read the Telegram feed.
    #[must_use]
    pub fn needs_bot(kind: FeedKind, dry_run: bool) -> bool {
        !dry_run || kind == FeedKind::Telegram
    }

    /// Creates the sent-message store.
    ///
    /// # Errors
    ///
    /// Returns an error if a dry run cannot read the existing store file.
    pub fn create_sent_store(settings: &DedupSettings, dry_run: bool) -> Result<Arc<dyn SentStore>> {
        let file = FileSentStore::new(&settings.path);
        if !dry_run {
            return Ok(Arc::new(file));
        }

        let keys = file.read_keys()?;
        tracing::debug!(
            path = %settings.path.display(),
            keys = keys.len(),
            "Dry run: sent-message store opened read-only"
        );
        Ok(Arc::new(MemorySentStore::with_keys(keys)))
    }

    /// Creates the notification transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a real run has no Bot API client.
    pub fn create_transport(
        client: Option<&Arc<BotApiClient>>,
        dry_run: bool,
    ) -> Result<Arc<dyn Transport>> {
        if dry_run {
            return Ok(Arc::new(DryRunTransport));
        }
        client
            .map(|client| Arc::new(BotApiTransport::new(Arc::clone(client))) as Arc<dyn Transport>)
            .ok_or_else(|| Error::Config("sending notifications requires a bot token".to_string()))
    }

    /// Creates the message feed.
    ///
    /// `live` is the line source of the `jsonl` feed. The Telegram feed
    /// accepts queued updates back to the lookback window when `backfill`
    /// is set, and only new ones otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the Telegram feed has no client.
    pub fn create_feed<R>(
        config: &WatchConfig,
        client: Option<Arc<BotApiClient>>,
        live: R,
        backfill: bool,
        shutdown: &CancellationToken,
    ) -> Result<Box<dyn Feed>>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        match (config.feed.kind, client) {
            (FeedKind::Telegram, Some(client)) => {
                let backlog = if backfill {
                    config.engine_config().lookback
                } else {
                    Duration::ZERO
                };
                let feed = BotApiFeed::new(client, Duration::from_secs(config.telegram.poll_timeout_secs))
                    .with_backlog_window(backlog)
                    .with_shutdown(shutdown.clone());
                Ok(Box::new(feed))
            },
            (FeedKind::Telegram, None) => {
                Err(Error::Config("telegram feed requires a bot token".to_string()))
            },
            (FeedKind::Jsonl, _) => {
                let mut feed = JsonLinesFeed::new().with_live(live);
                if let Some(dir) = &config.feed.archive_dir {
                    feed = feed.with_archive(dir);
                }
                Ok(Box::new(feed))
            },
        }
    }
}

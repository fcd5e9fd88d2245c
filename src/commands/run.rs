//! Run command handler.

use chanwatch::telegram::BotApiClient;
use chanwatch::{Deduplicator, Engine, Error, PatternSet, RunFactory, WatchConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Runs the watcher until the feed disconnects or Ctrl-C.
pub async fn cmd_run(config: WatchConfig, dry_run: bool, backfill: bool) -> chanwatch::Result<()> {
    config.validate()?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received; shutting down");
                shutdown.cancel();
            }
        }
    });

    let patterns = PatternSet::compile(&config.keywords);
    let store = RunFactory::create_sent_store(&config.dedup, dry_run)?;
    let dedup = Deduplicator::load(store, config.dedup.max_entries, config.dedup.policy)?;

    let client = if RunFactory::needs_bot(config.feed.kind, dry_run) {
        Some(connect(&config).await?)
    } else {
        None
    };
    let transport = RunFactory::create_transport(client.as_ref(), dry_run)?;
    let live = BufReader::new(tokio::io::stdin());
    let feed = RunFactory::create_feed(&config, client, live, backfill, &shutdown)?;

    let mut engine = Engine::new(config.engine_config(), patterns, dedup, transport)?
        .with_shutdown(shutdown.clone());
    let stats = engine.run(feed.as_ref(), backfill).await?;
    shutdown.cancel();

    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "Watcher stopped"
    );
    Ok(())
}

/// Creates the Bot API client and checks the token with `getMe`.
async fn connect(config: &WatchConfig) -> chanwatch::Result<Arc<BotApiClient>> {
    let client = BotApiClient::new(
        config.bot_token()?,
        &config.telegram.api_base,
        Duration::from_secs(config.telegram.request_timeout_secs),
    )?;

    let me = client
        .get_me()
        .await
        .map_err(|e| Error::Config(format!("bot token rejected: {e}")))?;
    tracing::info!(bot = me.username.as_deref().unwrap_or("?"), "Authenticated with the Bot API");

    Ok(Arc::new(client))
}

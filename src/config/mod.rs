//! Configuration management.
//!
//! Configuration comes from a TOML file, environment variables and a `.env`
//! file (loaded by the binary). `${VAR}` references in string values are
//! expanded from the environment; relative paths resolve against the
//! directory of the config file.
//!
//! ```toml
//! destination = "@my_alerts"
//! keywords = ["urgent", "sale"]
//! channels_file = "channels.txt"
//!
//! [telegram]
//! bot_token = "${TELEGRAM_BOT_TOKEN}"
//!
//! [dedup]
//! path = "sent_messages.txt"
//! max_entries = 10000
//! ```

use crate::dedup::{DEFAULT_MAX_ENTRIES, EvictionPolicy};
use crate::engine::{DEFAULT_BACKFILL_LIMIT, EngineConfig};
use crate::models::ChannelId;
use crate::observability::{LogFormat, LoggingSettings, MetricsSettings};
use crate::telegram::DEFAULT_API_BASE;
use crate::{Error, Result};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CHANWATCH_CONFIG_PATH";
/// Environment variable overriding the bot token.
pub const BOT_TOKEN_ENV: &str = "CHANWATCH_BOT_TOKEN";
/// Environment variable overriding the destination.
pub const DESTINATION_ENV: &str = "CHANWATCH_DESTINATION";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "CHANWATCH_LOG_LEVEL";

static ENV_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").ok());

/// Which feed the binary watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedKind {
    /// Bot API long polling.
    #[default]
    Telegram,
    /// JSON-lines archives and stdin.
    Jsonl,
}

impl FeedKind {
    /// Parses a feed kind, defaulting to `Telegram`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "jsonl" | "json-lines" | "json_lines" => Self::Jsonl,
            _ => Self::Telegram,
        }
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Jsonl => "jsonl",
        }
    }
}

/// Engine timing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Backfill window in hours.
    pub lookback_hours: u64,
    /// Messages fetched per channel during backfill.
    pub backfill_limit: usize,
    /// Pause after each backfill delivery, in milliseconds.
    pub pacing_ms: u64,
    /// Send the startup announcement.
    pub announce_startup: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 12,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
            pacing_ms: 1000,
            announce_startup: true,
        }
    }
}

/// Sent-message store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupSettings {
    /// Store file.
    pub path: PathBuf,
    /// Bound on remembered deliveries.
    pub max_entries: usize,
    /// What happens when the bound is exceeded.
    pub policy: EvictionPolicy,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sent_messages.txt"),
            max_entries: DEFAULT_MAX_ENTRIES,
            policy: EvictionPolicy::default(),
        }
    }
}

/// Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Bot token.
    pub bot_token: Option<SecretString>,
    /// API endpoint.
    pub api_base: String,
    /// Long-poll timeout for `getUpdates`.
    pub poll_timeout_secs: u64,
    /// Timeout of every other request.
    pub request_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

/// Feed selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSettings {
    /// Feed implementation.
    pub kind: FeedKind,
    /// Directory of `<channel>.jsonl` history files.
    pub archive_dir: Option<PathBuf>,
}

/// Resolved configuration of the watcher.
#[derive(Debug, Clone, Default)]
pub struct WatchConfig {
    /// Keywords to look for.
    pub keywords: Vec<String>,
    /// Channels to watch.
    pub channels: Vec<ChannelId>,
    /// Chat that receives notifications.
    pub destination: String,
    /// Engine timings.
    pub engine: EngineSettings,
    /// Sent-message store.
    pub dedup: DedupSettings,
    /// Bot API.
    pub telegram: TelegramSettings,
    /// Feed selection.
    pub feed: FeedSettings,
    /// Logging.
    pub logging: LoggingSettings,
    /// Metrics exporter.
    pub metrics: MetricsSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Inline keyword list.
    pub keywords: Option<Vec<String>>,
    /// File with one keyword per line.
    pub keywords_file: Option<String>,
    /// Inline channel list.
    pub channels: Option<Vec<String>>,
    /// File with one channel per line.
    pub channels_file: Option<String>,
    /// Destination chat.
    pub destination: Option<String>,
    /// Engine section.
    pub engine: Option<ConfigFileEngine>,
    /// Dedup section.
    pub dedup: Option<ConfigFileDedup>,
    /// Telegram section.
    pub telegram: Option<ConfigFileTelegram>,
    /// Feed section.
    pub feed: Option<ConfigFileFeed>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Engine section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEngine {
    /// Backfill window in hours.
    pub lookback_hours: Option<u64>,
    /// Messages fetched per channel.
    pub backfill_limit: Option<usize>,
    /// Pause after backfill deliveries.
    pub pacing_ms: Option<u64>,
    /// Startup announcement.
    pub announce_startup: Option<bool>,
}

/// Dedup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDedup {
    /// Store file.
    pub path: Option<String>,
    /// Bound on remembered deliveries.
    pub max_entries: Option<usize>,
    /// `reset` or `lru`.
    pub policy: Option<String>,
}

/// Telegram section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTelegram {
    /// Bot token (usually `${TELEGRAM_BOT_TOKEN}`).
    pub bot_token: Option<String>,
    /// API endpoint.
    pub api_base: Option<String>,
    /// Long-poll timeout.
    pub poll_timeout_secs: Option<u64>,
    /// Request timeout.
    pub request_timeout_secs: Option<u64>,
}

/// Feed section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFeed {
    /// `telegram` or `jsonl`.
    pub kind: Option<String>,
    /// History directory for the JSON-lines feed.
    pub archive_dir: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive, e.g. `info` or `chanwatch=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append-only log file.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Serve Prometheus metrics.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl WatchConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` if given, else the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_default(),
        }
    }

    /// Loads configuration from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("cannot parse {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_config_file(file, base)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. `CHANWATCH_CONFIG_PATH`
    /// 2. Platform-specific config dir (`~/Library/Application Support/chanwatch/` on macOS)
    /// 3. XDG config dir (`~/.config/chanwatch/` for Unix compatibility)
    ///
    /// Returns the default configuration if no file is found.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load_from_file(Path::new(&path));
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let candidates = [
            base_dirs.config_dir().join("chanwatch").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("chanwatch")
                .join("config.toml"),
        ];
        for candidate in candidates {
            if candidate.exists() {
                return Self::load_from_file(&candidate);
            }
        }

        tracing::debug!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Converts a `ConfigFile` to `WatchConfig`, resolving relative paths
    /// against `base`.
    pub fn from_config_file(file: ConfigFile, base: &Path) -> Result<Self> {
        let mut config = Self::default();
        let resolve = |raw: &str| resolve_path(base, &expand_env(raw));

        let mut keywords = file.keywords.unwrap_or_default();
        if let Some(path) = file.keywords_file {
            keywords.extend(read_entries(&resolve(&path))?);
        }
        config.keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let mut channels = file.channels.unwrap_or_default();
        if let Some(path) = file.channels_file {
            channels.extend(read_entries(&resolve(&path))?);
        }
        config.channels = channels
            .into_iter()
            .map(|c| expand_env(c.trim()))
            .filter(|c| !c.is_empty())
            .map(ChannelId::new)
            .collect();

        if let Some(destination) = file.destination {
            config.destination = expand_env(destination.trim());
        }

        if let Some(engine) = file.engine {
            if let Some(v) = engine.lookback_hours {
                config.engine.lookback_hours = v;
            }
            if let Some(v) = engine.backfill_limit {
                config.engine.backfill_limit = v;
            }
            if let Some(v) = engine.pacing_ms {
                config.engine.pacing_ms = v;
            }
            if let Some(v) = engine.announce_startup {
                config.engine.announce_startup = v;
            }
        }

        if let Some(dedup) = file.dedup {
            if let Some(path) = dedup.path {
                config.dedup.path = resolve(&path);
            } else {
                config.dedup.path = base.join(&config.dedup.path);
            }
            if let Some(v) = dedup.max_entries {
                config.dedup.max_entries = v;
            }
            if let Some(policy) = dedup.policy {
                config.dedup.policy = EvictionPolicy::parse(&policy);
            }
        } else {
            config.dedup.path = base.join(&config.dedup.path);
        }

        if let Some(telegram) = file.telegram {
            config.telegram.bot_token = telegram
                .bot_token
                .map(|t| expand_env(&t))
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from);
            if let Some(v) = telegram.api_base {
                config.telegram.api_base = expand_env(&v);
            }
            if let Some(v) = telegram.poll_timeout_secs {
                config.telegram.poll_timeout_secs = v;
            }
            if let Some(v) = telegram.request_timeout_secs {
                config.telegram.request_timeout_secs = v;
            }
        }

        if let Some(feed) = file.feed {
            if let Some(kind) = feed.kind {
                config.feed.kind = FeedKind::parse(&kind);
            }
            config.feed.archive_dir = feed.archive_dir.map(|dir| resolve(&dir));
        }

        if let Some(logging) = file.logging {
            config.logging.level = logging.level;
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(|file| resolve(&file));
        }

        if let Some(metrics) = file.metrics {
            if let Some(v) = metrics.enabled {
                config.metrics.enabled = v;
            }
            if let Some(v) = metrics.port {
                config.metrics.port = v;
            }
        }

        Ok(config)
    }

    /// Applies `CHANWATCH_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up by `lookup`.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram.bot_token = Some(SecretString::from(token));
        }
        if let Some(destination) = lookup(DESTINATION_ENV).filter(|v| !v.trim().is_empty()) {
            self.destination = destination.trim().to_string();
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.logging.level = Some(level);
        }
        self
    }

    /// Checks that the watcher can start.
    pub fn validate(&self) -> Result<()> {
        if self.destination.trim().is_empty() {
            return Err(Error::Config(format!(
                "destination is missing (set `destination` or {DESTINATION_ENV})"
            )));
        }
        if self.keywords.is_empty() {
            return Err(Error::Config(
                "no keywords configured (set `keywords` or `keywords_file`)".to_string(),
            ));
        }
        if self.channels.is_empty() {
            return Err(Error::Config(
                "no channels configured (set `channels` or `channels_file`)".to_string(),
            ));
        }
        if self.dedup.max_entries == 0 {
            return Err(Error::Config("dedup.max_entries must be positive".to_string()));
        }
        if self.feed.kind == FeedKind::Jsonl && self.feed.archive_dir.is_none() {
            tracing::warn!("JSON-lines feed without archive_dir; backfill will skip every channel");
        }
        Ok(())
    }

    /// Returns the bot token, or a configuration error if none is set.
    pub fn bot_token(&self) -> Result<SecretString> {
        self.telegram.bot_token.clone().ok_or_else(|| {
            Error::Config(format!(
                "telegram bot token is missing (set `telegram.bot_token` or {BOT_TOKEN_ENV})"
            ))
        })
    }

    /// Builds the engine parameters.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.destination.clone(), self.channels.iter().cloned())
            .with_lookback(Duration::from_secs(self.engine.lookback_hours.saturating_mul(3600)))
            .with_backfill_limit(self.engine.backfill_limit)
            .with_pacing(Duration::from_millis(self.engine.pacing_ms))
            .with_announce_startup(self.engine.announce_startup)
    }
}

impl fmt::Display for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<&str> = self.channels.iter().map(ChannelId::as_str).collect();
        let token = match &self.telegram.bot_token {
            Some(token) if !token.expose_secret().is_empty() => "[redacted]",
            _ => "(unset)",
        };

        writeln!(f, "destination      = {}", self.destination)?;
        writeln!(f, "keywords         = {}", self.keywords.join(", "))?;
        writeln!(f, "channels         = {}", channels.join(", "))?;
        writeln!(f, "lookback_hours   = {}", self.engine.lookback_hours)?;
        writeln!(f, "backfill_limit   = {}", self.engine.backfill_limit)?;
        writeln!(f, "pacing_ms        = {}", self.engine.pacing_ms)?;
        writeln!(f, "announce_startup = {}", self.engine.announce_startup)?;
        writeln!(f, "dedup.path       = {}", self.dedup.path.display())?;
        writeln!(f, "dedup.max        = {}", self.dedup.max_entries)?;
        writeln!(f, "dedup.policy     = {}", self.dedup.policy.as_str())?;
        writeln!(f, "feed.kind        = {}", self.feed.kind.as_str())?;
        if let Some(dir) = &self.feed.archive_dir {
            writeln!(f, "feed.archive_dir = {}", dir.display())?;
        }
        writeln!(f, "telegram.api     = {}", self.telegram.api_base)?;
        writeln!(f, "telegram.token   = {token}")?;
        writeln!(f, "log.format       = {}", self.logging.format.as_str())?;
        write!(
            f,
            "metrics          = {}",
            if self.metrics.enabled {
                format!("enabled on port {}", self.metrics.port)
            } else {
                "disabled".to_string()
            }
        )
    }
}

/// Expands `${VAR}` references from the process environment.
///
/// Unset variables expand to an empty string.
#[must_use]
pub fn expand_env(input: &str) -> String {
    expand_env_with(input, |name| std::env::var(name).ok())
}

/// Expands `${VAR}` references using `lookup`.
#[must_use]
pub fn expand_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let Some(pattern) = ENV_REFERENCE.as_ref() else {
        return input.to_string();
    };
    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                tracing::warn!(variable = name, "Referenced environment variable is not set");
                String::new()
            })
        })
        .into_owned()
}

/// Reads a list file: one entry per line, trimmed, blank lines dropped.
pub fn read_entries(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

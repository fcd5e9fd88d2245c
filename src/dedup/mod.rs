//! Record of messages that were already forwarded.
//!
//! The [`Deduplicator`] owns an in-memory [`SentSet`] and the [`SentStore`]
//! it is persisted to. The set is bounded by `max_entries`; what happens at
//! the bound depends on the [`EvictionPolicy`]:
//!
//! - `Reset` (default): once a save would persist more than `max_entries`
//!   keys, the set is emptied and the store deleted. Very old matches may be
//!   forwarded again after a reset.
//! - `Lru`: the least recently recorded key is evicted on insert, so the
//!   set never exceeds the bound and nothing recent is forgotten.

mod store;

pub use store::{FileSentStore, MemorySentStore, SentStore};

use crate::Result;
use crate::models::DeliveryKey;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default bound on remembered deliveries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// What to do when the sent set reaches its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Forget everything once the bound is exceeded.
    #[default]
    Reset,
    /// Evict the least recently recorded key.
    Lru,
}

impl EvictionPolicy {
    /// Parses a policy name, defaulting to `Reset`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "lru" => Self::Lru,
            _ => Self::Reset,
        }
    }

    /// Returns the policy name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Lru => "lru",
        }
    }
}

#[derive(Debug)]
enum Entries {
    Reset(HashSet<String>),
    Lru(LruCache<String, ()>),
}

/// Set of delivery keys.
#[derive(Debug)]
pub struct SentSet {
    entries: Entries,
}

impl SentSet {
    /// Creates an empty set for the given policy and bound.
    #[must_use]
    pub fn new(policy: EvictionPolicy, max_entries: usize) -> Self {
        let entries = match policy {
            EvictionPolicy::Reset => Entries::Reset(HashSet::new()),
            EvictionPolicy::Lru => Entries::Lru(LruCache::new(
                NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN),
            )),
        };
        Self { entries }
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        match &self.entries {
            Entries::Reset(set) => set.contains(key),
            Entries::Lru(cache) => cache.contains(key),
        }
    }

    /// Inserts `key`. Returns false if it was already present.
    pub fn insert(&mut self, key: String) -> bool {
        match &mut self.entries {
            Entries::Reset(set) => set.insert(key),
            Entries::Lru(cache) => cache.put(key, ()).is_none(),
        }
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.entries {
            Entries::Reset(set) => set.len(),
            Entries::Lru(cache) => cache.len(),
        }
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        match &mut self.entries {
            Entries::Reset(set) => set.clear(),
            Entries::Lru(cache) => cache.clear(),
        }
    }

    /// Keys in persistence order: oldest first for `Lru`, arbitrary for `Reset`.
    fn persisted_order(&self) -> Vec<&str> {
        match &self.entries {
            Entries::Reset(set) => set.iter().map(String::as_str).collect(),
            Entries::Lru(cache) => cache.iter().rev().map(|(k, ())| k.as_str()).collect(),
        }
    }
}

/// Bounded, persisted record of forwarded messages.
///
/// The engine is the only writer; nothing else is expected to touch the
/// store between load and save.
pub struct Deduplicator {
    store: Arc<dyn SentStore>,
    set: SentSet,
    max_entries: usize,
    policy: EvictionPolicy,
}

impl Deduplicator {
    /// Loads the persisted keys from `store`.
    ///
    /// Under `Reset`, a store holding more than `max_entries` keys means the
    /// bound was violated earlier: the store is deleted and the set starts
    /// empty. Under `Lru`, only the newest `max_entries` lines are kept.
    pub fn load(
        store: Arc<dyn SentStore>,
        max_entries: usize,
        policy: EvictionPolicy,
    ) -> Result<Self> {
        let keys = store.read_keys()?;
        let persisted = keys.len();
        let mut set = SentSet::new(policy, max_entries);
        for key in keys {
            set.insert(key);
        }

        match policy {
            EvictionPolicy::Reset if set.len() > max_entries => {
                tracing::warn!(
                    persisted = set.len(),
                    max_entries,
                    "Sent-message store exceeds its bound; starting from an empty set"
                );
                set.clear();
                store.clear()?;
            },
            EvictionPolicy::Lru if persisted > set.len() => {
                tracing::info!(
                    persisted,
                    kept = set.len(),
                    "Trimmed sent-message store to its newest entries"
                );
            },
            _ => {
                tracing::debug!(loaded = set.len(), policy = policy.as_str(), "Loaded sent-message store");
            },
        }

        Ok(Self {
            store,
            set,
            max_entries,
            policy,
        })
    }

    /// Returns true if `key` was already delivered.
    #[must_use]
    pub fn contains(&self, key: &DeliveryKey) -> bool {
        self.set.contains(key.as_str())
    }

    /// Adds `key` to the in-memory set. Does not persist.
    pub fn add(&mut self, key: &DeliveryKey) {
        self.set.insert(key.as_str().to_string());
    }

    /// Persists the set.
    ///
    /// Under `Reset`, a set larger than `max_entries` is cleared and the
    /// store deleted instead of written.
    pub fn save(&mut self) -> Result<()> {
        if self.policy == EvictionPolicy::Reset && self.set.len() > self.max_entries {
            tracing::info!(
                max_entries = self.max_entries,
                "Sent-message set exceeded its bound; resetting"
            );
            metrics::counter!("chanwatch_sent_set_resets_total").increment(1);
            self.set.clear();
            return self.store.clear();
        }

        let keys = self.set.persisted_order();
        self.store.write_keys(&keys)
    }

    /// Adds `key` and persists the set.
    pub fn record(&mut self, key: &DeliveryKey) -> Result<()> {
        self.add(key);
        self.save()
    }

    /// Number of remembered deliveries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns true if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Returns the configured bound.
    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns the eviction policy.
    #[must_use]
    pub const fn policy(&self) -> EvictionPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelId;

    fn key(channel: &str, id: i64) -> DeliveryKey {
        DeliveryKey::new(&ChannelId::new(channel), id)
    }

    fn load(store: &Arc<MemorySentStore>, max: usize, policy: EvictionPolicy) -> Deduplicator {
        Deduplicator::load(Arc::clone(store) as Arc<dyn SentStore>, max, policy).expect("load")
    }

    #[test]
    fn test_record_persists_every_key() {
        let store = Arc::new(MemorySentStore::new());
        let mut dedup = load(&store, 10, EvictionPolicy::Reset);

        dedup.record(&key("a", 1)).expect("record");
        dedup.record(&key("a", 2)).expect("record");

        let mut persisted = store.snapshot().expect("store exists");
        persisted.sort();
        assert_eq!(persisted, vec!["a:1".to_string(), "a:2".to_string()]);
        assert!(dedup.contains(&key("a", 1)));
        assert!(!dedup.contains(&key("b", 1)));
    }

    #[test]
    fn test_add_does_not_persist() {
        let store = Arc::new(MemorySentStore::new());
        let mut dedup = load(&store, 10, EvictionPolicy::Reset);

        dedup.add(&key("a", 1));
        assert!(dedup.contains(&key("a", 1)));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_reset_when_bound_exceeded_on_save() {
        let store = Arc::new(MemorySentStore::new());
        let mut dedup = load(&store, 3, EvictionPolicy::Reset);

        for id in 1..=3 {
            dedup.record(&key("a", id)).expect("record");
        }
        assert_eq!(store.snapshot().map(|k| k.len()), Some(3));

        dedup.record(&key("a", 4)).expect("record");
        assert!(dedup.is_empty());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_oversized_store_discarded_on_load() {
        let store = Arc::new(MemorySentStore::with_keys(["a:1", "a:2", "a:3"]));
        let dedup = load(&store, 2, EvictionPolicy::Reset);

        assert!(dedup.is_empty());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_store_at_bound_loads_intact() {
        let store = Arc::new(MemorySentStore::with_keys(["a:1", "a:2"]));
        let dedup = load(&store, 2, EvictionPolicy::Reset);

        assert_eq!(dedup.len(), 2);
        assert!(dedup.contains(&key("a", 2)));
    }

    #[test]
    fn test_lru_evicts_oldest_and_never_resets() {
        let store = Arc::new(MemorySentStore::new());
        let mut dedup = load(&store, 2, EvictionPolicy::Lru);

        for id in 1..=3 {
            dedup.record(&key("a", id)).expect("record");
        }

        assert_eq!(dedup.len(), 2);
        assert!(!dedup.contains(&key("a", 1)));
        assert_eq!(
            store.snapshot(),
            Some(vec!["a:2".to_string(), "a:3".to_string()])
        );
    }

    #[test]
    fn test_lru_load_keeps_newest_lines() {
        let store = Arc::new(MemorySentStore::with_keys(["a:1", "a:2", "a:3"]));
        let dedup = load(&store, 2, EvictionPolicy::Lru);

        assert_eq!(dedup.len(), 2);
        assert!(!dedup.contains(&key("a", 1)));
        assert!(dedup.contains(&key("a", 3)));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(EvictionPolicy::parse("LRU"), EvictionPolicy::Lru);
        assert_eq!(EvictionPolicy::parse("reset"), EvictionPolicy::Reset);
        assert_eq!(EvictionPolicy::parse("whatever"), EvictionPolicy::Reset);
    }
}

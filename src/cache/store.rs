//! Bounded LRU object store behind a single reader-writer lock.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CacheKey, MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
use crate::config::CacheConfig;
use crate::observability::metrics;

/// A stored response.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Bytes,
    size: usize,
    /// Recency marker; larger is more recent.
    seq: u64,
}

/// Why an insert stored nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRejected {
    /// The object alone exceeds the per-object limit.
    TooLarge,
    /// The cache was emptied and the object still does not fit.
    DoesNotFit,
}

/// Result of [`ObjectCache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The object was stored as the most recently used entry.
    Stored {
        /// Number of LRU entries evicted to make room.
        evicted: usize,
        /// Whether an older entry under the same key was replaced.
        replaced: bool,
    },
    Rejected(CacheRejected),
}

impl InsertOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, InsertOutcome::Stored { .. })
    }
}

/// Point-in-time view of the cache for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: usize,
    pub max_cache_size: usize,
    pub max_object_size: usize,
}

struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// seq → key, ascending; the first element is the LRU entry.
    recency: BTreeMap<u64, CacheKey>,
    total_size: usize,
    next_seq: u64,
    max_cache_size: usize,
    max_object_size: usize,
}

impl CacheState {
    fn new(max_cache_size: usize, max_object_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            total_size: 0,
            next_seq: 0,
            max_cache_size,
            max_object_size,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.seq);
        self.total_size -= entry.size;
        Some(entry)
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, key) = self.recency.pop_first()?;
        if let Some(entry) = self.entries.remove(&key) {
            self.total_size -= entry.size;
        }
        Some(key)
    }

    fn promote(&mut self, key: &CacheKey, observed_seq: u64) {
        let current = match self.entries.get(key) {
            Some(entry) if entry.seq == observed_seq => entry.seq,
            // Replaced, evicted or already promoted since the read.
            _ => return,
        };
        let seq = self.bump_seq();
        if let Some(entry) = self.entries.get_mut(key) {
            entry.seq = seq;
        }
        self.recency.remove(&current);
        self.recency.insert(seq, key.clone());
    }

    fn insert(&mut self, key: CacheKey, payload: Bytes) -> InsertOutcome {
        let size = payload.len();
        if size > self.max_object_size {
            return InsertOutcome::Rejected(CacheRejected::TooLarge);
        }

        let replaced = self.remove(&key).is_some();

        let mut evicted = 0;
        while self.total_size + size > self.max_cache_size {
            match self.evict_lru() {
                Some(victim) => {
                    tracing::debug!(key = %victim, "Evicted least recently used object");
                    evicted += 1;
                }
                None => break,
            }
        }
        if self.total_size + size > self.max_cache_size {
            return InsertOutcome::Rejected(CacheRejected::DoesNotFit);
        }

        let seq = self.bump_seq();
        self.recency.insert(seq, key.clone());
        self.entries.insert(key, CacheEntry { payload, size, seq });
        self.total_size += size;

        InsertOutcome::Stored { evicted, replaced }
    }
}

/// Shared, thread-safe web object cache with LRU eviction.
///
/// Cloning is cheap and yields a handle to the same cache. The lock is a
/// Tokio `RwLock`, which queues waiters fairly: once a writer is waiting,
/// newly arriving readers wait behind it.
#[derive(Clone)]
pub struct ObjectCache {
    inner: Arc<RwLock<CacheState>>,
}

impl ObjectCache {
    /// Create a cache with the standard 1 MiB / 10 KiB limits.
    pub fn new() -> Self {
        Self::with_limits(MAX_CACHE_SIZE, MAX_OBJECT_SIZE)
    }

    pub fn with_limits(max_cache_size: usize, max_object_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheState::new(max_cache_size, max_object_size))),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_cache_size, config.max_object_size)
    }

    /// Look up a cached object, marking it most recently used on a hit.
    ///
    /// The payload is copied under the read lock; the write lock is taken
    /// only to move the entry to the front of the recency order.
    pub async fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let found = {
            let state = self.inner.read().await;
            state
                .entries
                .get(key)
                .map(|entry| (entry.payload.clone(), entry.seq))
        };

        let Some((payload, seq)) = found else {
            metrics::record_cache_lookup(false);
            return None;
        };

        self.inner.write().await.promote(key, seq);
        metrics::record_cache_lookup(true);
        Some(payload)
    }

    /// Store an object, evicting least recently used entries as needed.
    pub async fn insert(&self, key: CacheKey, payload: Bytes) -> InsertOutcome {
        let (outcome, entries, total_size) = {
            let mut state = self.inner.write().await;
            let outcome = state.insert(key, payload);
            (outcome, state.entries.len(), state.total_size)
        };

        metrics::record_cache_insert(&outcome);
        metrics::record_cache_size(entries, total_size);
        outcome
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().await.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn total_size(&self) -> usize {
        self.inner.read().await.total_size
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.read().await;
        CacheStats {
            entries: state.entries.len(),
            total_size: state.total_size,
            max_cache_size: state.max_cache_size,
            max_object_size: state.max_object_size,
        }
    }

    /// Keys ordered from most to least recently used.
    pub async fn keys_by_recency(&self) -> Vec<CacheKey> {
        let state = self.inner.read().await;
        state.recency.values().rev().cloned().collect()
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

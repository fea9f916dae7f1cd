//! Bounded LRU cache of decoded frame textures.
//!
//! The cache is the arena for GPU textures: every handle it holds is owned by
//! it and released through the decoder exactly once, when the entry is
//! evicted, replaced, cleared, or the cache is dropped.

use super::TextureDecoder;
use crate::data::{CacheKey, Metadata};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// A decoded frame: texture handle plus the metadata it was published with.
#[derive(Debug, Clone)]
pub struct CacheEntry<H> {
    pub texture: H,
    pub metadata: Metadata,
}

impl<H> CacheEntry<H> {
    pub fn new(texture: H, metadata: Metadata) -> Self {
        Self { texture, metadata }
    }
}

/// Counters describing cache churn over the session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to make room for a new key
    pub evictions: u64,
    /// Handles released through the decoder (evict, replace, clear)
    pub disposals: u64,
    /// Releases the decoder reported as failed
    pub dispose_failures: u64,
}

struct Slot<H> {
    entry: CacheEntry<H>,
    last_used: u64,
}

/// LRU cache mapping `(date, dataset)` to decoded textures.
///
/// Recency is tracked with a monotonically increasing tick; `recency` maps
/// each live tick back to its key, so the least recently used entry is always
/// the first key in that map.
pub struct DatasetTextureCache<D: TextureDecoder> {
    decoder: Rc<D>,
    max_size: usize,
    tick: u64,
    entries: HashMap<CacheKey, Slot<D::Handle>>,
    recency: BTreeMap<u64, CacheKey>,
    stats: CacheStats,
}

impl<D: TextureDecoder> DatasetTextureCache<D> {
    /// Creates a cache holding at most `max_size` frames.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(decoder: Rc<D>, max_size: usize) -> Self {
        if max_size == 0 {
            log::warn!("Texture cache capacity of 0 requested, using 1");
        }
        Self {
            decoder,
            max_size: max_size.max(1),
            tick: 0,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up a frame, marking it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<&CacheEntry<D::Handle>> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.recency.remove(&slot.last_used);
                self.recency.insert(tick, *key);
                slot.last_used = tick;
                self.stats.hits += 1;
                Some(&slot.entry)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store a frame as the most recently used entry.
    ///
    /// A previous entry under the same key is disposed first. Otherwise, if
    /// the cache is full, the least recently used entry is evicted and
    /// disposed before the new one is admitted.
    pub fn set(&mut self, key: CacheKey, entry: CacheEntry<D::Handle>) {
        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.last_used);
            log::debug!("Replacing cached frame {}", key);
            self.release(&key, old.entry);
        } else if self.entries.len() >= self.max_size {
            self.evict_lru();
        }

        let tick = self.next_tick();
        self.recency.insert(tick, key);
        self.entries.insert(
            key,
            Slot {
                entry,
                last_used: tick,
            },
        );

        log::debug!(
            "Cached frame {}, now holding {}/{}",
            key,
            self.entries.len(),
            self.max_size
        );
    }

    /// Check whether a frame is cached without touching its recency.
    pub fn has(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Dispose every entry and empty the cache.
    pub fn clear(&mut self) {
        log::debug!("Clearing texture cache ({} frames)", self.entries.len());
        let recency = std::mem::take(&mut self.recency);
        for key in recency.into_values() {
            if let Some(slot) = self.entries.remove(&key) {
                self.release(&key, slot.entry);
            }
        }
    }

    /// Returns the number of cached frames.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Cached keys from least to most recently used.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.recency.values().copied().collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn evict_lru(&mut self) {
        let Some((_, key)) = self.recency.pop_first() else {
            return;
        };
        if let Some(slot) = self.entries.remove(&key) {
            self.stats.evictions += 1;
            log::debug!("Evicting least recently used frame {}", key);
            self.release(&key, slot.entry);
        }
    }

    /// Release a handle that has already been removed from the maps.
    ///
    /// Failures are logged and swallowed: eviction must never block progress.
    fn release(&mut self, key: &CacheKey, entry: CacheEntry<D::Handle>) {
        self.stats.disposals += 1;
        if let Err(e) = self.decoder.dispose(&entry.texture) {
            self.stats.dispose_failures += 1;
            log::warn!("Failed to dispose texture for {}: {}", key, e);
        }
    }
}

impl<D: TextureDecoder> Drop for DatasetTextureCache<D> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.clear();
        }
    }
}

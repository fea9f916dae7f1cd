//! Session statistics for the playback core.

use crate::texture::CacheStats;

/// Counters accumulated over a playback session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Snapshot of the texture cache counters.
    pub cache: CacheStats,

    /// Display loads issued (cache misses on the active frame).
    pub loads_issued: u64,

    /// Display loads whose results arrived after being superseded.
    pub stale_discards: u64,

    /// Display loads that failed and raised a notice.
    pub load_failures: u64,

    /// Next-frame prefetches issued.
    pub prefetches_issued: u64,

    /// Prefetches that failed (never surfaced to the user).
    pub prefetch_failures: u64,
}

impl SessionStats {
    /// Fraction of cache lookups that hit, if any lookups happened.
    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.cache.hits + self.cache.misses;
        if lookups == 0 {
            None
        } else {
            Some(self.cache.hits as f64 / lookups as f64)
        }
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let hit_rate = self
            .hit_rate()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "—".to_string());

        format!(
            "hits: {} ({}) · loads: {} · stale: {} · failed: {} · prefetched: {} · evicted: {}",
            self.cache.hits,
            hit_rate,
            self.loads_issued,
            self.stale_discards,
            self.load_failures,
            self.prefetches_issued,
            self.cache.evictions
        )
    }
}

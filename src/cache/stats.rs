//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how [`QueryCache`](super::QueryCache) requests were served.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Served from a fresh entry without a network call
    hits: AtomicU64,
    /// Started a new fetch
    misses: AtomicU64,
    /// Attached to a fetch already in flight
    dedup_joins: AtomicU64,
    /// Fetches that settled with an error
    failures: AtomicU64,
    /// Entries dropped by the size bound
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dedup_join(&self) {
        self.dedup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of fetches started. Each miss is exactly one network call.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn dedup_joins(&self) -> u64 {
        self.dedup_joins.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Fraction of requests served without starting a fetch
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits() + self.dedup_joins();
        let total = served + self.misses();
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_miss();
        stats.record_hit();
        stats.record_dedup_join();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 0.75);
    }
}

//! Page pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a [`PagePool`](crate::PagePool).
///
/// Counters are independent `Relaxed` atomics, readable without the pool's
/// state lock. A snapshot taken while the pool is busy may mix counts from
/// slightly different moments.
///
/// # Example
/// ```
/// use larchdb::PoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = PoolStats::new();
/// stats.cache_misses.fetch_add(2, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().cache_misses, 2);
/// ```
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Fetches served from a resident entry.
    pub cache_hits: AtomicU64,

    /// Fetches that had to produce an entry.
    pub cache_misses: AtomicU64,

    /// LRU entries recycled to serve a miss.
    pub evictions: AtomicU64,

    /// Pages read from store data files.
    pub pages_read: AtomicU64,

    /// Pages written to store data files.
    pub pages_written: AtomicU64,

    /// Write-backs that failed and closed their store.
    pub write_back_failures: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn counters(&self) -> [&AtomicU64; 6] {
        [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.write_back_failures,
        ]
    }

    /// Fraction of fetches that were hits, 0.0 when nothing was fetched.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let [hits, misses, evictions, read, written, failures] =
            self.counters().map(|counter| counter.load(Ordering::Relaxed));
        StatsSnapshot {
            cache_hits: hits,
            cache_misses: misses,
            evictions,
            pages_read: read,
            pages_written: written,
            write_back_failures: failures,
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub write_back_failures: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches that were hits, 0.0 when nothing was fetched.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }

    /// Counts accumulated between `earlier` and this snapshot.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
            evictions: self.evictions.saturating_sub(earlier.evictions),
            pages_read: self.pages_read.saturating_sub(earlier.pages_read),
            pages_written: self.pages_written.saturating_sub(earlier.pages_written),
            write_back_failures: self
                .write_back_failures
                .saturating_sub(earlier.write_back_failures),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} evictions={} reads={} writes={} write_back_failures={} \
             hit_rate={:.2}%",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.write_back_failures,
            self.hit_rate() * 100.0
        )
    }
}

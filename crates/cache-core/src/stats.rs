//! Observation counters updated by the cache.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the cache bumps as a side effect of probing and move reconstruction.
///
/// Shared between the cache and its owner through an `Arc`. All updates are
/// `Relaxed`; the numbers are for reporting only.
#[derive(Debug, Default)]
pub struct CacheStats {
    probes: AtomicU64,
    hits: AtomicU64,
    best_move_probes: AtomicU64,
    valid_best_moves: AtomicU64,
    invalid_best_moves: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub probes: u64,
    pub hits: u64,
    pub best_move_probes: u64,
    pub valid_best_moves: u64,
    pub invalid_best_moves: u64,
}

impl StatsSnapshot {
    /// Hit rate in percent, 0 when nothing was probed.
    pub fn hit_rate(&self) -> f64 {
        if self.probes == 0 {
            0.0
        } else {
            self.hits as f64 * 100.0 / self.probes as f64
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_best_move_probe(&self) {
        self.best_move_probes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_best_move(&self, valid: bool) {
        if valid {
            self.valid_best_moves.fetch_add(1, Ordering::Relaxed);
        } else {
            self.invalid_best_moves.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            probes: self.probes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            best_move_probes: self.best_move_probes.load(Ordering::Relaxed),
            valid_best_moves: self.valid_best_moves.load(Ordering::Relaxed),
            invalid_best_moves: self.invalid_best_moves.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn clear(&self) {
        self.probes.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.best_move_probes.store(0, Ordering::Relaxed);
        self.valid_best_moves.store(0, Ordering::Relaxed);
        self.invalid_best_moves.store(0, Ordering::Relaxed);
    }
}

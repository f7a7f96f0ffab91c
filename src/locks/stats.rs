//! In-process lock counters, reported by `LockManager::stats()`.
//!
//! These mirror the `metrics` facade events but stay readable without an
//! installed recorder.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct LockStats {
    acquired: AtomicU64,
    contended: AtomicU64,
    reclaimed: AtomicU64,
    wait_micros: AtomicU64,
}

impl LockStats {
    pub(crate) fn record_acquire(&self, waited: Duration, contended: bool) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        if contended {
            self.contended.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(waited.as_micros()).unwrap_or(u64::MAX);
        self.wait_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaim(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            total_wait: Duration::from_micros(self.wait_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of the lock counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStatsSnapshot {
    /// Successful acquisitions.
    pub acquired: u64,
    /// Acquisitions that had to wait at least one poll interval.
    pub contended: u64,
    /// Stale degraded artifacts removed.
    pub reclaimed: u64,
    /// Cumulative time spent waiting in successful acquisitions.
    pub total_wait: Duration,
}

impl LockStatsSnapshot {
    pub fn average_wait(&self) -> Duration {
        if self.acquired == 0 {
            return Duration::ZERO;
        }
        let per = self.total_wait.as_micros() / u128::from(self.acquired);
        Duration::from_micros(u64::try_from(per).unwrap_or(u64::MAX))
    }

    pub fn contention_rate(&self) -> f64 {
        if self.acquired == 0 {
            0.0
        } else {
            self.contended as f64 / self.acquired as f64
        }
    }
}

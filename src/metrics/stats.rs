use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every allocator operation.
#[derive(Debug)]
pub struct StatsCounter {
    issued: AtomicU64,
    rejected: AtomicU64,
    marked_seen: AtomicU64,
    exhausted: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            issued: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            marked_seen: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_issued(&self) {
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self, count: u64) {
        self.rejected.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_marked_seen(&self) {
        self.marked_seen.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> Metrics {
        let issued = self.issued.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let marked_seen = self.marked_seen.load(Ordering::Relaxed);
        let exhausted = self.exhausted.load(Ordering::Relaxed);
        let drawn = issued + rejected;
        let rejection_rate = if drawn == 0 {
            0.0_f64
        } else {
            rejected as f64 / drawn as f64
        };
        Metrics {
            issued,
            rejected,
            marked_seen,
            exhausted,
            rejection_rate,
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of allocator statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Identifiers handed out by `next`.
    pub issued: u64,
    /// Candidates drawn from the permutation but turned away by the filter.
    pub rejected: u64,
    /// Identifiers recorded through `mark_seen`.
    pub marked_seen: u64,
    /// `next` calls that gave up with `CapacityExhausted`.
    pub exhausted: u64,
    /// `rejected / (issued + rejected)`, or `0.0` before the first draw.
    pub rejection_rate: f64,
}

impl Metrics {
    /// Candidates drawn from the permutation, accepted or not.
    pub fn draw_count(&self) -> u64 {
        self.issued + self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_zero_rate() {
        let stats = StatsCounter::new().snapshot();
        assert_eq!(stats.draw_count(), 0);
        assert_eq!(stats.rejection_rate, 0.0);
    }

    #[test]
    fn rejection_rate_counts_all_draws() {
        let counter = StatsCounter::new();
        counter.record_issued();
        counter.record_issued();
        counter.record_issued();
        counter.record_rejected(1);
        counter.record_marked_seen();
        counter.record_exhausted();
        let stats = counter.snapshot();
        assert_eq!(stats.issued, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.marked_seen, 1);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.draw_count(), 4);
        assert!((stats.rejection_rate - 0.25).abs() < 1e-12);
    }
}

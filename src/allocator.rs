use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::builder::AllocatorBuilder;
use crate::error::{Error, Result};
use crate::filter::{Shape, StableFilter};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::permutation::RangePermutation;
use crate::seeds::HashSeedTable;

/// Candidates `next` may reject per identifier in the range before giving up.
pub(crate) const DEFAULT_RETRY_FACTOR: usize = 4;

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// Issues 16-bit identifiers that do not repeat within a permutation cycle
/// and are unlikely to repeat shortly after one.
///
/// Candidates come from a [`RangePermutation`]; any candidate the
/// [`StableFilter`] reports as recently issued is skipped, and every issued
/// identifier is recorded in the filter.
///
/// The allocator is single-threaded (`&mut self`).  Use
/// [`SharedAllocator`] to share one between threads.
///
/// # Example
/// ```
/// use sbf_ids::{shape_for, Allocator};
///
/// let shape = shape_for(512, Some(255)).unwrap();
/// let mut ids = Allocator::new(shape, 0..1024).unwrap();
/// let a = ids.next().unwrap();
/// let b = ids.next().unwrap();
/// assert_ne!(a, b);
/// ```
#[derive(Debug)]
pub struct Allocator {
    permutation: RangePermutation,
    filter: StableFilter,
    seeds: &'static HashSeedTable,
    max_retries: usize,
    metrics: Arc<StatsCounter>,
}

impl Allocator {
    /// Creates an allocator over `range` whose filter has `shape`.
    pub fn new(shape: Shape, range: Range<u32>) -> Result<Self> {
        let permutation = RangePermutation::new(range)?;
        let max_retries = permutation.len() * DEFAULT_RETRY_FACTOR;
        Ok(Self::from_parts(permutation, StableFilter::new(shape), max_retries))
    }

    /// Returns an [`AllocatorBuilder`] with default settings.
    pub fn builder() -> AllocatorBuilder {
        AllocatorBuilder::new()
    }

    pub(crate) fn from_parts(
        permutation: RangePermutation,
        filter: StableFilter,
        max_retries: usize,
    ) -> Self {
        debug!(
            range = ?permutation.range(),
            shape = %filter.shape(),
            max_retries,
            "allocator created"
        );
        Allocator {
            permutation,
            filter,
            seeds: HashSeedTable::global(),
            max_retries,
            metrics: Arc::new(StatsCounter::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Returns the next identifier.
    ///
    /// Fails with [`Error::CapacityExhausted`] once `max_retries` candidates
    /// in a row were recently issued.  Widening the range, clearing the
    /// filter or waiting for other identifiers to be issued elsewhere (see
    /// [`mark_seen`](Allocator::mark_seen)) all make room again.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<u16> {
        for attempt in 0..self.max_retries {
            let candidate = self.permutation.draw();
            let seeds = self.seeds.seeds_for(candidate);
            if !self.filter.might_contain(&seeds) {
                self.filter.insert(&seeds);
                self.metrics.record_rejected(attempt as u64);
                self.metrics.record_issued();
                return Ok(candidate);
            }
        }

        self.metrics.record_rejected(self.max_retries as u64);
        self.metrics.record_exhausted();
        warn!(
            attempts = self.max_retries,
            range = ?self.permutation.range(),
            cardinality = self.filter.cardinality(),
            "no fresh identifier found"
        );
        Err(Error::CapacityExhausted {
            attempts: self.max_retries,
        })
    }

    /// Records `value` as issued without drawing it, e.g. when another
    /// allocator or a legacy path handed it out.
    pub fn mark_seen(&mut self, value: u16) {
        self.filter.insert(&self.seeds.seeds_for(value));
        self.metrics.record_marked_seen();
    }

    /// Forgets every issued identifier.  The permutation cycle is kept.
    pub fn clear(&mut self) {
        self.filter.clear();
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Non-zero cells in the filter.
    pub fn cardinality(&self) -> usize {
        self.filter.cardinality()
    }

    pub fn filter(&self) -> &StableFilter {
        &self.filter
    }

    pub fn shape(&self) -> &Shape {
        self.filter.shape()
    }

    pub fn range(&self) -> Range<u32> {
        self.permutation.range()
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn stats(&self) -> Metrics {
        self.metrics.snapshot()
    }
}

// ---------------------------------------------------------------------------
// SharedAllocator
// ---------------------------------------------------------------------------

/// A cloneable, thread-safe handle to one [`Allocator`].
///
/// Every `next` and `mark_seen` runs under a single mutex, which keeps the
/// permutation's compaction and the filter's age-then-set step atomic with
/// respect to each other.  Statistics are read without taking the lock.
///
/// # Example
/// ```
/// use sbf_ids::AllocatorBuilder;
///
/// let ids = AllocatorBuilder::new().range(0..4096).build_shared().unwrap();
/// let worker = ids.clone();
/// let handle = std::thread::spawn(move || worker.next().unwrap());
/// let mine = ids.next().unwrap();
/// assert_ne!(mine, handle.join().unwrap());
/// ```
#[derive(Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<Allocator>>,
    metrics: Arc<StatsCounter>,
}

impl SharedAllocator {
    pub fn new(allocator: Allocator) -> Self {
        let metrics = Arc::clone(&allocator.metrics);
        SharedAllocator {
            inner: Arc::new(Mutex::new(allocator)),
            metrics,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Result<u16> {
        self.inner.lock().next()
    }

    pub fn mark_seen(&self, value: u16) {
        self.inner.lock().mark_seen(value);
    }

    pub fn cardinality(&self) -> usize {
        self.inner.lock().cardinality()
    }

    /// Runs `f` with exclusive access, e.g. to issue a batch under one lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Allocator) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn stats(&self) -> Metrics {
        self.metrics.snapshot()
    }
}

impl From<Allocator> for SharedAllocator {
    fn from(allocator: Allocator) -> Self {
        SharedAllocator::new(allocator)
    }
}

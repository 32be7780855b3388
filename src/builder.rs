use std::ops::Range;

use crate::allocator::{Allocator, SharedAllocator, DEFAULT_RETRY_FACTOR};
use crate::error::{Error, Result};
use crate::filter::{shape_for, Shape, StableFilter};
use crate::permutation::RangePermutation;
use crate::sampler::IndexSampler;
use crate::seeds::DOMAIN_SIZE;

/// Builder for configuring and constructing an [`Allocator`].
///
/// Every setting is optional.  With none given the allocator draws from the
/// whole 16-bit domain and sizes its filter for one full cycle.
///
/// # Example
/// ```
/// use sbf_ids::AllocatorBuilder;
///
/// let mut ids = AllocatorBuilder::new()
///     .range(1_000..2_000)
///     .capacity(500)
///     .reset_value(255)
///     .build()
///     .unwrap();
/// let id = ids.next().unwrap();
/// assert!((1_000..2_000).contains(&id));
/// ```
#[derive(Debug, Clone)]
pub struct AllocatorBuilder {
    range: Range<u32>,
    capacity: Option<usize>,
    reset_value: Option<u8>,
    shape: Option<Shape>,
    max_retries: Option<usize>,
    seeds: Option<((u64, u64), (u64, u64))>,
}

impl AllocatorBuilder {
    pub fn new() -> Self {
        AllocatorBuilder {
            range: 0..DOMAIN_SIZE as u32,
            capacity: None,
            reset_value: None,
            shape: None,
            max_retries: None,
            seeds: None,
        }
    }

    /// Identifiers are drawn from `range` (default: `0..0x10000`).
    pub fn range(mut self, range: Range<u32>) -> Self {
        self.range = range;
        self
    }

    /// Number of recent identifiers the filter is sized for
    /// (default: the range length).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Value a cell is set to on insert (default: 2).  Higher values keep
    /// identifiers in memory for longer.
    pub fn reset_value(mut self, reset_value: u8) -> Self {
        self.reset_value = Some(reset_value);
        self
    }

    /// Use an explicit filter shape.  Overrides `capacity` and `reset_value`.
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Rejected candidates `next` tolerates before failing with
    /// [`Error::CapacityExhausted`] (default: four times the range length).
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Seed the permutation and filter samplers instead of drawing from OS
    /// entropy.  Each pair is `(index, increment)`.
    pub fn seeds(mut self, permutation: (u64, u64), filter: (u64, u64)) -> Self {
        self.seeds = Some((permutation, filter));
        self
    }

    pub fn build(self) -> Result<Allocator> {
        let (perm_sampler, filter_sampler) = match self.seeds {
            Some(((pi, pc), (fi, fc))) => (
                IndexSampler::with_seeds(pi, pc),
                IndexSampler::with_seeds(fi, fc),
            ),
            None => (IndexSampler::new(), IndexSampler::new()),
        };
        let permutation = RangePermutation::with_sampler(self.range, perm_sampler)?;

        let shape = match self.shape {
            Some(shape) => shape,
            None => {
                let capacity = self.capacity.unwrap_or_else(|| permutation.len().max(2));
                shape_for(capacity, self.reset_value)?
            }
        };

        let max_retries = self
            .max_retries
            .unwrap_or(permutation.len() * DEFAULT_RETRY_FACTOR);
        if max_retries == 0 {
            return Err(Error::invalid("max_retries must be greater than 0"));
        }

        Ok(Allocator::from_parts(
            permutation,
            StableFilter::with_sampler(shape, filter_sampler),
            max_retries,
        ))
    }

    pub fn build_shared(self) -> Result<SharedAllocator> {
        self.build().map(SharedAllocator::new)
    }
}

impl Default for AllocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Without-replacement sampling over a sub-range of the 16-bit domain.
//!
//! A working buffer holds the values not yet drawn in the current cycle,
//! packed at the front.  Each draw picks a live slot with the
//! [`IndexSampler`], then closes the gap by shifting the tail of the live
//! region one slot left, so every value in the range comes out exactly once
//! per cycle.  When the live region is empty the buffer is refilled and a
//! new cycle starts with no memory of the previous order.

use std::ops::Range;

use tracing::trace;

use crate::error::{Error, Result};
use crate::sampler::IndexSampler;
use crate::seeds::DOMAIN_SIZE;

/// Cycle-local pseudorandom permutation of `[start, end)`.
#[derive(Clone, Debug)]
pub struct RangePermutation {
    buffer: Vec<u16>,
    start: u32,
    /// Number of live (not yet drawn) slots at the front of `buffer`.
    limit: usize,
    sampler: IndexSampler,
}

impl RangePermutation {
    /// Permutes `range`, seeding the sampler from OS entropy.
    ///
    /// `range` must be non-empty and lie within `[0, 0x10000)`.
    pub fn new(range: Range<u32>) -> Result<Self> {
        Self::with_sampler(range, IndexSampler::new())
    }

    /// Permutes `range` using `sampler` to pick slots.
    pub fn with_sampler(range: Range<u32>, sampler: IndexSampler) -> Result<Self> {
        if range.start >= range.end {
            return Err(Error::invalid(format!(
                "range {}..{} is empty or inverted",
                range.start, range.end
            )));
        }
        if range.end as usize > DOMAIN_SIZE {
            return Err(Error::invalid(format!(
                "range end {:#x} exceeds the 16-bit domain",
                range.end
            )));
        }
        let buffer: Vec<u16> = range.clone().map(|v| v as u16).collect();
        Ok(RangePermutation {
            limit: buffer.len(),
            buffer,
            start: range.start,
            sampler,
        })
    }

    /// Permutes the entire 16-bit domain.
    pub fn full() -> Self {
        RangePermutation {
            buffer: (0..=u16::MAX).collect(),
            start: 0,
            limit: DOMAIN_SIZE,
            sampler: IndexSampler::new(),
        }
    }

    fn refill(&mut self) {
        for (slot, v) in self.buffer.iter_mut().zip(self.start..) {
            *slot = v as u16;
        }
        self.limit = self.buffer.len();
        trace!(start = self.start, len = self.limit, "permutation cycle restarted");
    }

    /// Returns the next value of the current cycle, starting a new cycle
    /// first if the current one is used up.
    pub fn draw(&mut self) -> u16 {
        if self.limit == 0 {
            self.refill();
        }
        let idx = self.sampler.next(self.limit);
        self.limit -= 1;
        let result = self.buffer[idx];
        if self.limit > 0 {
            self.buffer.copy_within(idx + 1..=self.limit, idx);
        }
        result
    }

    /// `true` until the first draw of a cycle.
    pub fn at_start(&self) -> bool {
        self.limit == self.buffer.len()
    }

    /// Values left in the current cycle.
    pub fn remaining(&self) -> usize {
        self.limit
    }

    /// Cycle length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The permuted range.
    pub fn range(&self) -> Range<u32> {
        self.start..self.start + self.buffer.len() as u32
    }
}

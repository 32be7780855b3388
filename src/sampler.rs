//! Pseudorandom index generation by enhanced double hashing.
//!
//! This is not a general purpose PRNG.  Two 64-bit seeds drawn from OS
//! entropy define the start point and the step of a double-hashing walk;
//! the step itself shrinks by an ever-growing counter, which adds a
//! tetrahedral term to the sequence and breaks up the short cycles plain
//! double hashing falls into when the step shares a factor with `limit`.
//!
//! Reference: Kirsch & Mitzenmacher, *Less Hashing, Same Performance:
//! Building a Better Bloom Filter* (2006).
//!
//! Exact non-repetition is not a property of this generator.  The
//! permutation layer removes drawn slots to get that, and the stable filter
//! tolerates repeats by design.

use rand::Rng;

/// Mutable three-counter state machine yielding indices in `[0, limit)`.
///
/// One instance is owned by each [`RangePermutation`] and each
/// [`StableFilter`]; it is never shared.
///
/// [`RangePermutation`]: crate::RangePermutation
/// [`StableFilter`]: crate::StableFilter
#[derive(Clone, Debug)]
pub struct IndexSampler {
    index: i64,
    increment: i64,
    count: i64,
}

impl IndexSampler {
    /// Creates a sampler whose seeds come from the thread-local OS-seeded RNG.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self::with_seeds(rng.gen(), rng.gen())
    }

    /// Creates a sampler with fixed seeds.  Two samplers built from the same
    /// seeds produce the same sequence for the same limits.
    pub fn with_seeds(index: u64, increment: u64) -> Self {
        IndexSampler {
            index: index as i64,
            increment: increment as i64,
            count: 1,
        }
    }

    /// Returns the next index in `[0, limit)` and advances the state.
    ///
    /// # Panics
    /// If `limit` is zero.
    #[inline]
    pub fn next(&mut self, limit: usize) -> usize {
        assert!(limit > 0, "sampler limit must be greater than 0");
        let idx = unsigned_mod(self.index, limit);
        self.index = self.index.wrapping_sub(self.increment);
        self.increment = self.increment.wrapping_sub(self.count);
        self.count = self.count.wrapping_add(1);
        idx
    }
}

impl Default for IndexSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// `dividend mod divisor` with `dividend` read as an unsigned 64-bit value.
#[inline]
pub(crate) fn unsigned_mod(dividend: i64, divisor: usize) -> usize {
    ((dividend as u64) % divisor as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_stay_below_limit() {
        let mut sampler = IndexSampler::new();
        for limit in 1..200usize {
            for _ in 0..50 {
                assert!(sampler.next(limit) < limit);
            }
        }
    }

    #[test]
    fn limit_one_always_yields_zero() {
        let mut sampler = IndexSampler::with_seeds(u64::MAX, 12345);
        for _ in 0..100 {
            assert_eq!(sampler.next(1), 0);
        }
    }

    #[test]
    fn same_seeds_same_sequence() {
        let mut a = IndexSampler::with_seeds(0xDEAD_BEEF, 0xCAFE_F00D);
        let mut b = IndexSampler::with_seeds(0xDEAD_BEEF, 0xCAFE_F00D);
        for limit in (1..500usize).rev() {
            assert_eq!(a.next(limit), b.next(limit));
        }
    }

    #[test]
    fn state_transition_follows_recurrence() {
        // index=10, increment=3: index walks 10 -> 7 -> 5 as the step shrinks 3 -> 2.
        let mut sampler = IndexSampler::with_seeds(10, 3);
        assert_eq!(sampler.next(1000), 10);
        assert_eq!(sampler.next(1000), 7);
        assert_eq!(sampler.next(1000), 5);
    }

    #[test]
    fn negative_state_is_read_unsigned() {
        // -1 as u64 is 2^64 - 1, and (2^64 - 1) mod 10 = 5.
        assert_eq!(unsigned_mod(-1, 10), 5);
        assert_eq!(unsigned_mod(i64::MIN, 7), ((1u64 << 63) % 7) as usize);
    }

    #[test]
    fn draws_spread_over_small_domain() {
        let mut sampler = IndexSampler::new();
        let mut seen = [false; 17];
        for _ in 0..4_000 {
            seen[sampler.next(17)] = true;
        }
        assert!(seen.iter().all(|&s| s), "every slot should be hit: {:?}", seen);
    }
}

use crate::error::{Error, Result};
use crate::sampler::IndexSampler;
use crate::seeds::SeedPair;

use super::cells::{CellBuffer, CellStore};
use super::shape::Shape;

/// A stable (self-aging) counting Bloom filter.
///
/// **Role in the allocator**: remembers which identifiers were issued
/// recently so a fresh permutation cycle does not immediately hand them out
/// again.  Unlike a plain Bloom filter it never fills up: every insert first
/// decrements [`cells_decremented_per_insert`] pseudorandomly chosen cells,
/// so memberships fade after enough unrelated inserts and the fraction of
/// zero cells settles at the shape's stable point.
///
/// Based on Deng & Rafiei (2006), *Approximately Detecting Duplicates for
/// Streaming Data using Stable Bloom Filters*.
///
/// Probe indices come from the caller's [`SeedPair`]; the decrement targets
/// come from the filter's own [`IndexSampler`] and are independent of any
/// inserted value.
///
/// [`cells_decremented_per_insert`]: Shape::cells_decremented_per_insert
#[derive(Clone, Debug)]
pub struct StableFilter {
    shape: Shape,
    cells: CellBuffer,
    sampler: IndexSampler,
}

impl StableFilter {
    /// Creates an empty filter whose decrement sampler is seeded from OS
    /// entropy.
    pub fn new(shape: Shape) -> Self {
        Self::with_sampler(shape, IndexSampler::new())
    }

    /// Creates an empty filter that picks decrement targets with `sampler`.
    pub fn with_sampler(shape: Shape, sampler: IndexSampler) -> Self {
        StableFilter {
            cells: CellBuffer::for_shape(&shape),
            shape,
            sampler,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    fn probes(&self, seeds: &SeedPair) -> impl Iterator<Item = usize> {
        seeds.indices(
            self.shape.number_of_entries(),
            self.shape.number_of_hash_functions(),
        )
    }

    /// Returns `true` if every cell probed by `seeds` is non-zero.
    ///
    /// False positives are bounded by the shape's probability at target
    /// load.  False negatives occur only once aging has cleared one of the
    /// item's cells.
    #[inline]
    pub fn might_contain(&self, seeds: &SeedPair) -> bool {
        self.probes(seeds).all(|i| self.cells.is_set(i))
    }

    /// Ages the filter by one step, then sets every cell probed by `seeds`
    /// to the reset value.
    ///
    /// Aging first means the new entry is always fully present when the call
    /// returns.
    pub fn insert(&mut self, seeds: &SeedPair) {
        self.age_out();
        let m = self.shape.number_of_entries();
        for i in seeds.indices(m, self.shape.number_of_hash_functions()) {
            self.cells.set(i);
        }
    }

    /// Decrements `cells_decremented_per_insert` sampled cells, each floored
    /// at zero.
    pub fn age_out(&mut self) {
        let m = self.shape.number_of_entries();
        for _ in 0..self.shape.cells_decremented_per_insert() {
            let i = self.sampler.next(m);
            self.cells.decrement(i);
        }
    }

    /// Ages the filter, then sets the given cells.  Unlike [`insert`],
    /// the indices are caller-supplied and checked.
    ///
    /// Nothing is modified when an index is out of range.
    ///
    /// [`insert`]: StableFilter::insert
    pub fn insert_indices<I>(&mut self, indices: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        let indices: Vec<usize> = indices.into_iter().collect();
        self.check_indices(&indices)?;
        self.age_out();
        for i in indices {
            self.cells.set(i);
        }
        Ok(())
    }

    /// Returns `Ok(true)` if every given cell is non-zero.
    pub fn contains_indices<I>(&self, indices: I) -> Result<bool>
    where
        I: IntoIterator<Item = usize>,
    {
        let len = self.shape.number_of_entries();
        let mut all = true;
        for i in indices {
            if i >= len {
                return Err(Error::IndexOutOfRange { index: i, len });
            }
            all &= self.cells.is_set(i);
        }
        Ok(all)
    }

    fn check_indices(&self, indices: &[usize]) -> Result<()> {
        let len = self.shape.number_of_entries();
        match indices.iter().find(|&&i| i >= len) {
            Some(&index) => Err(Error::IndexOutOfRange { index, len }),
            None => Ok(()),
        }
    }

    /// Number of non-zero cells.
    pub fn cardinality(&self) -> usize {
        (0..self.cells.len()).filter(|&i| self.cells.is_set(i)).count()
    }

    /// Value stored in cell `i`.
    ///
    /// # Panics
    /// If `i` is not below the shape's number of entries.
    pub fn count(&self, i: usize) -> u8 {
        self.cells.get(i)
    }

    /// Calls `f(index, count)` for every non-zero cell, in index order.
    pub fn for_each_count<F: FnMut(usize, u8)>(&self, mut f: F) {
        for i in 0..self.cells.len() {
            let c = self.cells.get(i);
            if c != 0 {
                f(i, c);
            }
        }
    }

    /// Bitmap of the non-zero cells: cell `i` is bit `i % 64` of word
    /// `i / 64`.
    pub fn bit_maps(&self) -> Vec<u64> {
        let m = self.shape.number_of_entries();
        let mut words = vec![0u64; (m + 63) / 64];
        self.for_each_count(|i, _| words[i >> 6] |= 1u64 << (i & 63));
        words
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Adds `other`'s per-cell counts into this filter, saturating at the
    /// cell ceiling.
    pub fn add(&mut self, other: &StableFilter) -> Result<()> {
        self.combine_with(other, |a, b| a + b)
    }

    /// Subtracts `other`'s per-cell counts from this filter, stopping at
    /// zero.
    pub fn subtract(&mut self, other: &StableFilter) -> Result<()> {
        self.combine_with(other, |a, b| a - b)
    }

    fn combine_with(&mut self, other: &StableFilter, op: impl Fn(i32, i32) -> i32) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::invalid(format!(
                "cannot combine filters of different shapes: {} vs {}",
                self.shape, other.shape
            )));
        }
        let mut touched = Vec::new();
        other.for_each_count(|i, c| touched.push((i, c)));
        for (i, c) in touched {
            self.cells.combine(i, c, &op);
        }
        Ok(())
    }

    /// Deep copy of the cell state sharing the same shape.  The copy ages
    /// with a fresh, independently seeded sampler.
    pub fn copy(&self) -> StableFilter {
        StableFilter {
            shape: self.shape,
            cells: self.cells.clone(),
            sampler: IndexSampler::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::HashSeedTable;

    fn small() -> StableFilter {
        StableFilter::new(Shape::for_max_elements(5, None).unwrap())
    }

    fn seeds(v: u16) -> SeedPair {
        HashSeedTable::global().seeds_for(v)
    }

    #[test]
    fn empty_filter_contains_nothing() {
        let filter = StableFilter::new(Shape::for_max_elements(1_000, None).unwrap());
        assert_eq!(filter.cardinality(), 0);
        for v in 0..2_000u16 {
            assert!(!filter.might_contain(&seeds(v)), "value {v}");
        }
    }

    #[test]
    fn insert_then_contains() {
        let mut filter = small();
        for v in 0..200u16 {
            filter.insert(&seeds(v));
            assert!(filter.might_contain(&seeds(v)), "value {v}");
        }
    }

    #[test]
    fn inserted_cells_hold_reset_value() {
        let shape = Shape::for_max_elements(100, Some(9)).unwrap();
        let mut filter = StableFilter::new(shape);
        let pair = seeds(42);
        filter.insert(&pair);
        for i in pair.indices(shape.number_of_entries(), shape.number_of_hash_functions()) {
            assert_eq!(filter.count(i), 9);
        }
    }

    #[test]
    fn cleared_filter_forgets() {
        let mut filter = small();
        filter.insert(&seeds(7));
        filter.clear();
        assert_eq!(filter.cardinality(), 0);
        assert!(!filter.might_contain(&seeds(7)));
    }

    #[test]
    fn aging_without_inserts_empties_filter() {
        let mut filter = small();
        filter.insert(&seeds(1));
        assert!(filter.cardinality() > 0);
        // 7 decrements per step over 17 cells with a reset value of 2.
        for _ in 0..2_000 {
            filter.age_out();
        }
        assert_eq!(filter.cardinality(), 0);
        assert!(!filter.might_contain(&seeds(1)));
    }

    #[test]
    fn cardinality_settles_near_expected() {
        let shape = Shape::for_max_elements(1_000, None).unwrap();
        let mut filter = StableFilter::new(shape);
        for v in 0..20_000u32 {
            filter.insert(&seeds(v as u16));
        }
        let expected = shape.expected_cardinality() as f64;
        let actual = filter.cardinality() as f64;
        assert!(
            (actual - expected).abs() < expected * 0.25,
            "cardinality {actual} far from expected {expected}"
        );
    }

    #[test]
    fn counts_never_exceed_reset_value() {
        let mut filter = small();
        for v in 0..500u16 {
            filter.insert(&seeds(v));
        }
        filter.for_each_count(|i, c| assert!(c <= 2, "cell {i} = {c}"));
    }

    #[test]
    fn copy_matches_original_until_mutated() {
        let mut filter = StableFilter::new(Shape::for_max_elements(200, None).unwrap());
        for v in 0..150u16 {
            filter.insert(&seeds(v));
        }
        let copy = filter.copy();
        assert_eq!(copy.cardinality(), filter.cardinality());
        assert_eq!(copy.bit_maps(), filter.bit_maps());
        for v in 0..=u16::MAX {
            assert_eq!(copy.might_contain(&seeds(v)), filter.might_contain(&seeds(v)));
        }
        filter.clear();
        assert!(copy.cardinality() > 0, "copy must not alias the original");
    }

    #[test]
    fn add_and_subtract_saturate() {
        let shape = Shape::for_max_elements(5, Some(3)).unwrap();
        let mut a = StableFilter::new(shape);
        let mut b = StableFilter::new(shape);
        // Aging an empty filter is a no-op, so these land exactly.
        a.insert_indices([0, 1]).unwrap();
        b.insert_indices([1, 2]).unwrap();

        a.add(&b).unwrap();
        assert_eq!((a.count(0), a.count(1), a.count(2)), (3, 3, 3));
        assert_eq!(a.cardinality(), 3);

        a.subtract(&b).unwrap();
        assert_eq!((a.count(0), a.count(1), a.count(2)), (3, 0, 0));
        a.subtract(&b).unwrap();
        assert_eq!((a.count(0), a.count(1), a.count(2)), (3, 0, 0));
    }

    #[test]
    fn add_saturates_wide_cells_at_255() {
        let shape = Shape::for_max_elements(5, Some(200)).unwrap();
        let mut a = StableFilter::new(shape);
        let mut b = StableFilter::new(shape);
        a.insert_indices([4]).unwrap();
        b.insert_indices([4]).unwrap();
        a.add(&b).unwrap();
        assert_eq!(a.count(4), 255);
        a.subtract(&b).unwrap();
        assert_eq!(a.count(4), 55);
    }

    #[test]
    fn combining_mismatched_shapes_fails() {
        let mut a = small();
        let b = StableFilter::new(Shape::for_max_elements(6, None).unwrap());
        assert!(matches!(a.add(&b), Err(Error::InvalidParameter(_))));
        assert!(matches!(a.subtract(&b), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn explicit_indices_are_checked() {
        let mut filter = small();
        let err = filter.insert_indices([3, 17]).unwrap_err();
        assert_eq!(err, Error::IndexOutOfRange { index: 17, len: 17 });
        assert_eq!(filter.cardinality(), 0, "rejected insert must not modify cells");

        filter.insert_indices([3, 16]).unwrap();
        assert_eq!(filter.contains_indices([3, 16]), Ok(true));
        assert_eq!(
            filter.contains_indices([3, 16, 18]),
            Err(Error::IndexOutOfRange { index: 18, len: 17 })
        );
    }

    #[test]
    fn bit_maps_mark_non_zero_cells() {
        let shape = Shape::from_entries(130, 3, None).unwrap();
        let mut filter = StableFilter::with_sampler(shape, IndexSampler::with_seeds(1, 1));
        filter.insert_indices([0, 64, 129]).unwrap();
        let maps = filter.bit_maps();
        assert_eq!(maps.len(), 3);
        let mut expected = vec![0u64; 3];
        filter.for_each_count(|i, _| expected[i / 64] |= 1 << (i % 64));
        assert_eq!(maps, expected);
        assert_eq!(
            maps.iter().map(|w| w.count_ones() as usize).sum::<usize>(),
            filter.cardinality()
        );
    }
}

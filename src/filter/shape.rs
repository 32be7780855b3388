use std::f64::consts::LN_2;
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};

/// Reset value used when none is given for a capacity-sized shape.
pub const DEFAULT_RESET_VALUE: u8 = 2;

/// Cell width used when none is given for an explicitly sized shape.
pub const DEFAULT_BITS_PER_CELL: u8 = 2;

/// `ln(1 / 2^ln2)`: the denominator of the optimal-size Bloom formula.
const SIZE_DENOMINATOR: f64 = -(LN_2 * LN_2);

/// Largest cell count a filter may have; sampler limits are kept below 2^31.
const MAX_ENTRIES: usize = i32::MAX as usize;

/// Immutable structural parameters of a [`StableFilter`].
///
/// The decrement rate is derived analytically (Deng & Rafiei, *Approximately
/// Detecting Duplicates for Streaming Data using Stable Bloom Filters*,
/// SIGMOD 2006) so that the long-run fraction of zero cells converges to
/// [`stable_point`](Shape::stable_point), which bounds the false positive
/// rate of a filter that is never cleared.
///
/// [`StableFilter`]: crate::StableFilter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shape {
    number_of_entries: usize,
    number_of_hash_functions: usize,
    reset_value: u8,
    bits_per_cell: u8,
    cells_per_byte: u8,
    cells_decremented_per_insert: usize,
    stable_point: f64,
    expected_cardinality: usize,
    fps: f64,
}

impl Shape {
    /// Sizes a shape for `max_elements` live items with a target false
    /// positive probability of `1 / max_elements`.
    ///
    /// `reset_value` defaults to [`DEFAULT_RESET_VALUE`].
    ///
    /// # Example
    /// ```
    /// use sbf_ids::Shape;
    ///
    /// let shape = Shape::for_max_elements(5, None).unwrap();
    /// assert_eq!(shape.number_of_entries(), 17);
    /// assert_eq!(shape.number_of_hash_functions(), 2);
    /// assert_eq!(shape.cells_decremented_per_insert(), 7);
    /// ```
    pub fn for_max_elements(max_elements: usize, reset_value: Option<u8>) -> Result<Self> {
        let reset_value = check_reset_value(reset_value.unwrap_or(DEFAULT_RESET_VALUE))?;
        if max_elements < 2 {
            return Err(Error::invalid(format!(
                "max_elements must be at least 2 (probability 1/n must lie in (0, 1)), got {max_elements}"
            )));
        }

        let n = max_elements as f64;
        let probability = 1.0 / n;
        let m = (n * probability.ln() / SIZE_DENOMINATOR).ceil();
        if !(m >= 1.0 && m <= MAX_ENTRIES as f64) {
            return Err(Error::invalid(format!(
                "max_elements {max_elements} needs {m} cells, more than {MAX_ENTRIES}"
            )));
        }
        let m = m as usize;
        let k = (LN_2 * m as f64 / n).round();
        if k < 1.0 {
            return Err(Error::invalid(format!(
                "max_elements {max_elements} yields zero hash functions over {m} cells"
            )));
        }
        let k = k as usize;

        // The probability actually reached at `max_elements` items, which is
        // close to but not exactly `1 / max_elements`.
        let fps = (1.0 - (-(k as f64) * n / m as f64).exp()).powi(k as i32);
        Self::derive(m, k, reset_value, fps)
    }

    /// Builds a shape over `number_of_entries` cells probed by
    /// `number_of_hash_functions` indices, with the false positive
    /// probability taken as `e^-k`.
    ///
    /// `reset_value` defaults to the ceiling of a
    /// [`DEFAULT_BITS_PER_CELL`]-wide cell.
    pub fn from_entries(
        number_of_entries: usize,
        number_of_hash_functions: usize,
        reset_value: Option<u8>,
    ) -> Result<Self> {
        let reset_value = check_reset_value(
            reset_value.unwrap_or(cell_ceiling(DEFAULT_BITS_PER_CELL)),
        )?;
        check_dimensions(number_of_entries, number_of_hash_functions)?;

        let fps = (-(number_of_hash_functions as f64)).exp();
        if fps == 0.0 {
            return Err(Error::invalid(format!(
                "probability must be greater than 0, reduce the number of hash functions ({number_of_hash_functions})"
            )));
        }
        Self::derive(number_of_entries, number_of_hash_functions, reset_value, fps)
    }

    /// Like [`from_entries`](Shape::from_entries) with the reset value set to
    /// the largest value a `bits_per_cell`-wide cell holds.
    pub fn with_bits_per_cell(
        number_of_entries: usize,
        number_of_hash_functions: usize,
        bits_per_cell: u8,
    ) -> Result<Self> {
        if !(1..=8).contains(&bits_per_cell) {
            return Err(Error::invalid(format!(
                "bits_per_cell must be in the range [1, 8], got {bits_per_cell}"
            )));
        }
        Self::from_entries(
            number_of_entries,
            number_of_hash_functions,
            Some(cell_ceiling(bits_per_cell)),
        )
    }

    fn derive(m: usize, k: usize, reset_value: u8, fps: f64) -> Result<Self> {
        let one_over_k = 1.0 / k as f64;
        let one_over_m = 1.0 / m as f64;
        let one_over_max = 1.0 / reset_value as f64;

        let left = 1.0 / (1.0 - fps.powf(one_over_k)).powf(one_over_max) - 1.0;
        let right = one_over_k - one_over_m;
        let decrements = (1.0 / (left * right)).ceil();
        if !decrements.is_finite() || decrements < 1.0 {
            return Err(Error::invalid(format!(
                "degenerate decrement rate {decrements} for m={m} k={k} fps={fps}"
            )));
        }
        let decrements = decrements as usize;

        let stable_point =
            (1.0 / (1.0 + 1.0 / (decrements as f64 * right))).powi(reset_value as i32);
        let expected_cardinality = ((1.0 - stable_point) * m as f64).ceil() as usize;

        let bits_per_cell = (u8::BITS - reset_value.leading_zeros()) as u8;
        let shape = Shape {
            number_of_entries: m,
            number_of_hash_functions: k,
            reset_value,
            bits_per_cell,
            cells_per_byte: 8 / bits_per_cell,
            cells_decremented_per_insert: decrements,
            stable_point,
            expected_cardinality,
            fps,
        };
        debug!(%shape, "derived stable filter shape");
        Ok(shape)
    }

    /// Number of cells (m).
    pub fn number_of_entries(&self) -> usize {
        self.number_of_entries
    }

    /// Indices probed per membership test or insert (k).
    pub fn number_of_hash_functions(&self) -> usize {
        self.number_of_hash_functions
    }

    /// Value written into a cell on insert.
    pub fn reset_value(&self) -> u8 {
        self.reset_value
    }

    pub fn bits_per_cell(&self) -> u8 {
        self.bits_per_cell
    }

    pub fn cells_per_byte(&self) -> u8 {
        self.cells_per_byte
    }

    /// Cells aged by one step on every insert.
    pub fn cells_decremented_per_insert(&self) -> usize {
        self.cells_decremented_per_insert
    }

    /// Limiting fraction of zero cells as the insert count grows.
    pub fn stable_point(&self) -> f64 {
        self.stable_point
    }

    /// Non-zero cells expected once the filter is stable.
    pub fn expected_cardinality(&self) -> usize {
        self.expected_cardinality
    }

    /// False positive probability the decrement rate was derived from.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Size of the backing cell buffer in bytes.  Cells never straddle a
    /// byte boundary, so widths that do not divide 8 leave spare bits.
    pub fn buffer_len(&self) -> usize {
        let per_byte = self.cells_per_byte as usize;
        (self.number_of_entries + per_byte - 1) / per_byte
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shape[k={} m={} fps={} stable point={} expected cardinality={} decrement count={} reset value={}]",
            self.number_of_hash_functions,
            self.number_of_entries,
            self.fps,
            self.stable_point,
            self.expected_cardinality,
            self.cells_decremented_per_insert,
            self.reset_value,
        )
    }
}

/// Caller-facing shorthand for [`Shape::for_max_elements`].
pub fn shape_for(capacity: usize, reset_value: Option<u8>) -> Result<Shape> {
    Shape::for_max_elements(capacity, reset_value)
}

fn check_reset_value(reset_value: u8) -> Result<u8> {
    if reset_value < 2 {
        return Err(Error::invalid(format!(
            "reset_value must be in the range [2, 255], got {reset_value}"
        )));
    }
    Ok(reset_value)
}

fn check_dimensions(m: usize, k: usize) -> Result<()> {
    if m == 0 || m > MAX_ENTRIES {
        return Err(Error::invalid(format!(
            "number_of_entries must be in the range [1, {MAX_ENTRIES}], got {m}"
        )));
    }
    if k == 0 || k >= m {
        return Err(Error::invalid(format!(
            "number_of_hash_functions must be in the range [1, {m}), got {k}"
        )));
    }
    Ok(())
}

#[inline]
fn cell_ceiling(bits_per_cell: u8) -> u8 {
    ((1u16 << bits_per_cell) - 1) as u8
}

//! Fixed-width saturating counters packed into a byte buffer.
//!
//! Cells are 1 to 8 bits wide and never straddle a byte.  When a cell is a
//! whole byte wide (or wider than half a byte, which leaves room for only
//! one per byte) the byte is addressed directly; otherwise several cells
//! share a byte and are isolated with a shift and a mask.
//!
//! Indices always come from the owning filter's hash or sampler, so an
//! index outside `[0, len)` is a defect and panics.

use super::shape::Shape;

/// Storage operations a [`StableFilter`] needs from its cell buffer.
///
/// [`StableFilter`]: crate::StableFilter
pub trait CellStore {
    /// Number of addressable cells.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of cell `i`.
    fn get(&self, i: usize) -> u8;

    /// Writes the reset value into cell `i`.
    fn set(&mut self, i: usize);

    /// Subtracts one from cell `i`, stopping at zero.
    fn decrement(&mut self, i: usize);

    fn is_set(&self, i: usize) -> bool {
        self.get(i) != 0
    }

    /// Zeroes every cell.
    fn clear(&mut self);

    /// Stores `op(get(i), operand)` clamped to `[0, max_value()]`: the bit
    /// mask for packed cells, 255 for byte-wide ones.
    fn combine(&mut self, i: usize, operand: u8, op: impl Fn(i32, i32) -> i32);

    /// Largest value a cell can hold.
    fn max_value(&self) -> u8;

    /// The raw backing bytes.
    fn as_bytes(&self) -> &[u8];
}

#[inline]
fn clamp_cell(value: i32, max: u8) -> u8 {
    value.clamp(0, max as i32) as u8
}

#[inline]
fn check_index(i: usize, len: usize) {
    assert!(i < len, "cell index {i} out of range for {len} cells");
}

// ---------------------------------------------------------------------------
// One cell per byte
// ---------------------------------------------------------------------------

/// One byte per cell.  A cell may hold any `u8` regardless of the reset
/// value's width, so `combine` saturates at 255.
#[derive(Clone, Debug)]
pub struct UnpackedCells {
    bytes: Vec<u8>,
    reset_value: u8,
}

impl UnpackedCells {
    pub fn new(shape: &Shape) -> Self {
        UnpackedCells {
            bytes: vec![0u8; shape.number_of_entries()],
            reset_value: shape.reset_value(),
        }
    }
}

impl CellStore for UnpackedCells {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn get(&self, i: usize) -> u8 {
        check_index(i, self.bytes.len());
        self.bytes[i]
    }

    #[inline]
    fn set(&mut self, i: usize) {
        check_index(i, self.bytes.len());
        self.bytes[i] = self.reset_value;
    }

    #[inline]
    fn decrement(&mut self, i: usize) {
        check_index(i, self.bytes.len());
        self.bytes[i] = self.bytes[i].saturating_sub(1);
    }

    fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn combine(&mut self, i: usize, operand: u8, op: impl Fn(i32, i32) -> i32) {
        check_index(i, self.bytes.len());
        let value = op(self.bytes[i] as i32, operand as i32);
        self.bytes[i] = clamp_cell(value, u8::MAX);
    }

    #[inline]
    fn max_value(&self) -> u8 {
        u8::MAX
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Several cells per byte
// ---------------------------------------------------------------------------

/// `cells_per_byte` cells of `bits_per_cell` bits sharing each byte.
///
/// Cell `i` lives in byte `i / cells_per_byte` at bit offset
/// `(i % cells_per_byte) * bits_per_cell`.
#[derive(Clone, Debug)]
pub struct PackedCells {
    bytes: Vec<u8>,
    len: usize,
    reset_value: u8,
    /// `(1 << bits_per_cell) - 1`.
    mask: u8,
    bits_per_cell: u8,
    cells_per_byte: u8,
}

impl PackedCells {
    pub fn new(shape: &Shape) -> Self {
        PackedCells {
            bytes: vec![0u8; shape.buffer_len()],
            len: shape.number_of_entries(),
            reset_value: shape.reset_value(),
            mask: cell_mask(shape.bits_per_cell()),
            bits_per_cell: shape.bits_per_cell(),
            cells_per_byte: shape.cells_per_byte(),
        }
    }

    /// Returns `(byte_index, bit_offset)` for cell `i`.
    #[inline]
    fn location(&self, i: usize) -> (usize, u32) {
        check_index(i, self.len);
        let per_byte = self.cells_per_byte as usize;
        let offset = (i % per_byte) as u32 * self.bits_per_cell as u32;
        (i / per_byte, offset)
    }

    #[inline]
    fn read(&self, (pos, off): (usize, u32)) -> u8 {
        (self.bytes[pos] >> off) & self.mask
    }

    #[inline]
    fn write(&mut self, (pos, off): (usize, u32), value: u8) {
        let cleared = self.bytes[pos] & !(self.mask << off);
        self.bytes[pos] = cleared | ((value & self.mask) << off);
    }
}

impl CellStore for PackedCells {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn get(&self, i: usize) -> u8 {
        self.read(self.location(i))
    }

    #[inline]
    fn set(&mut self, i: usize) {
        let loc = self.location(i);
        self.write(loc, self.reset_value);
    }

    #[inline]
    fn decrement(&mut self, i: usize) {
        let loc = self.location(i);
        let value = self.read(loc);
        if value > 0 {
            self.write(loc, value - 1);
        }
    }

    #[inline]
    fn is_set(&self, i: usize) -> bool {
        let (pos, off) = self.location(i);
        self.bytes[pos] & (self.mask << off) != 0
    }

    fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn combine(&mut self, i: usize, operand: u8, op: impl Fn(i32, i32) -> i32) {
        let loc = self.location(i);
        let value = op(self.read(loc) as i32, operand as i32);
        self.write(loc, clamp_cell(value, self.mask));
    }

    #[inline]
    fn max_value(&self) -> u8 {
        self.mask
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// CellBuffer
// ---------------------------------------------------------------------------

/// The cell store variant chosen for a shape.  Picked once at construction
/// and fixed for the owning filter's lifetime.
#[derive(Clone, Debug)]
pub enum CellBuffer {
    Unpacked(UnpackedCells),
    Packed(PackedCells),
}

impl CellBuffer {
    pub fn for_shape(shape: &Shape) -> Self {
        if shape.cells_per_byte() == 1 {
            CellBuffer::Unpacked(UnpackedCells::new(shape))
        } else {
            CellBuffer::Packed(PackedCells::new(shape))
        }
    }

}

macro_rules! dispatch {
    ($self:expr, $cells:ident => $body:expr) => {
        match $self {
            CellBuffer::Unpacked($cells) => $body,
            CellBuffer::Packed($cells) => $body,
        }
    };
}

impl CellStore for CellBuffer {
    #[inline]
    fn len(&self) -> usize {
        dispatch!(self, c => c.len())
    }

    #[inline]
    fn get(&self, i: usize) -> u8 {
        dispatch!(self, c => c.get(i))
    }

    #[inline]
    fn set(&mut self, i: usize) {
        dispatch!(self, c => c.set(i))
    }

    #[inline]
    fn decrement(&mut self, i: usize) {
        dispatch!(self, c => c.decrement(i))
    }

    #[inline]
    fn is_set(&self, i: usize) -> bool {
        dispatch!(self, c => c.is_set(i))
    }

    fn clear(&mut self) {
        dispatch!(self, c => c.clear())
    }

    fn combine(&mut self, i: usize, operand: u8, op: impl Fn(i32, i32) -> i32) {
        dispatch!(self, c => c.combine(i, operand, op))
    }

    fn max_value(&self) -> u8 {
        dispatch!(self, c => c.max_value())
    }

    fn as_bytes(&self) -> &[u8] {
        dispatch!(self, c => c.as_bytes())
    }
}

#[inline]
fn cell_mask(bits_per_cell: u8) -> u8 {
    ((1u16 << bits_per_cell) - 1) as u8
}

pub mod cells;
pub mod shape;
pub mod stable;

pub use cells::{CellBuffer, CellStore, PackedCells, UnpackedCells};
pub use shape::{shape_for, Shape};
pub use stable::StableFilter;

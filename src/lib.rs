//! Short-lived 16-bit identifiers that avoid recent reuse.
//!
//! An [`Allocator`] draws candidates from a [`RangePermutation`] of a
//! sub-range of `[0, 0x10000)` and skips any candidate a [`StableFilter`]
//! remembers as recently issued.  The filter ages itself on every insert, so
//! old identifiers become available again without any explicit release.
//!
//! ```
//! use sbf_ids::AllocatorBuilder;
//!
//! let mut ids = AllocatorBuilder::new().range(0..256).build().unwrap();
//! let first = ids.next().unwrap();
//! assert!(first < 256);
//! ```

mod allocator;
mod builder;
mod error;
pub mod filter;
mod metrics;
pub mod permutation;
pub mod sampler;
pub mod seeds;

pub use allocator::{Allocator, SharedAllocator};
pub use builder::AllocatorBuilder;
pub use error::{Error, Result};
pub use filter::{shape_for, Shape, StableFilter};
pub use metrics::stats::Metrics;
pub use permutation::RangePermutation;
pub use sampler::IndexSampler;
pub use seeds::{HashSeedTable, SeedPair, DOMAIN_SIZE};

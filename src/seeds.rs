//! Per-identifier hash seeds and the index derivation built on them.
//!
//! Every 16-bit identifier maps to a fixed [`SeedPair`].  The pairs for the
//! whole domain are computed once per process into [`HashSeedTable`], so
//! the allocator's hot loop is a table lookup followed by `k` additions.

use std::fmt;

use once_cell::sync::Lazy;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

/// Number of distinct 16-bit identifiers.
pub const DOMAIN_SIZE: usize = 0x1_0000;

/// Two 64-bit seeds from which a filter derives its `k` probe indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeedPair {
    pub initial: u64,
    pub increment: u64,
}

impl SeedPair {
    pub const fn new(initial: u64, increment: u64) -> Self {
        SeedPair { initial, increment }
    }

    /// Hashes the big-endian encoding of `value` with XXH3-128; the high half
    /// becomes `initial`, the low half `increment`.
    pub fn from_value(value: u16) -> Self {
        let h = xxh3_128(&value.to_be_bytes());
        SeedPair {
            initial: (h >> 64) as u64,
            increment: h as u64,
        }
    }

    /// Yields `k` indices in `[0, m)` by enhanced double hashing.
    ///
    /// The index steps backwards by the increment, and the increment steps
    /// backwards by the iteration counter, both modulo `m`.
    ///
    /// # Panics
    /// If `m` is zero.
    pub fn indices(self, m: usize, k: usize) -> impl Iterator<Item = usize> {
        assert!(m > 0, "index space must not be empty");
        let bits = m as u64;
        let mut index = self.initial % bits;
        let mut inc = self.increment % bits;
        (0..k as u64).map(move |i| {
            let current = index;
            index = if index >= inc { index - inc } else { index + bits - inc };
            let step = i % bits;
            inc = if inc >= step { inc - step } else { inc + bits - step };
            current as usize
        })
    }
}

static GLOBAL: Lazy<HashSeedTable> = Lazy::new(HashSeedTable::build);

/// Read-only `u16 -> SeedPair` lookup covering the entire domain.
pub struct HashSeedTable {
    seeds: Box<[SeedPair]>,
}

impl HashSeedTable {
    fn build() -> Self {
        let seeds = (0..DOMAIN_SIZE)
            .map(|v| SeedPair::from_value(v as u16))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        debug!(entries = seeds.len(), "built hash seed table");
        HashSeedTable { seeds }
    }

    /// The process-wide table, built on first access.
    pub fn global() -> &'static HashSeedTable {
        &GLOBAL
    }

    /// Builds the process-wide table now instead of on the first allocation.
    pub fn init() {
        Lazy::force(&GLOBAL);
    }

    #[inline]
    pub fn seeds_for(&self, value: u16) -> SeedPair {
        self.seeds[value as usize]
    }
}

impl fmt::Debug for HashSeedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashSeedTable")
            .field("len", &self.seeds.len())
            .finish()
    }
}

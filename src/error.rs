use thiserror::Error;

/// Errors surfaced by shape derivation, filter algebra and allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed construction input (reset value, probability, range, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A caller-supplied cell index does not fit the filter.
    #[error("index {index} out of range for {len} cells")]
    IndexOutOfRange { index: usize, len: usize },

    /// `Allocator::next` rejected `attempts` candidates in a row.
    #[error("capacity exhausted after {attempts} rejected candidates")]
    CapacityExhausted { attempts: usize },
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

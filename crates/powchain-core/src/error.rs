//! Chain error types.

use thiserror::Error;

/// Errors returned by block construction, chain mutation and validation.
///
/// Validation failures (`StaleHash`, `BrokenLink`) are ordinary values: the
/// caller decides whether to repair, reject or just log them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// `create_genesis` was called on a chain that already has blocks.
    #[error("chain already has a genesis block")]
    AlreadyInitialized,

    /// A tamper, reseal or repair target is past the tail.
    #[error("block index {index} out of bounds for chain of length {len}")]
    InvalidIndex { index: u64, len: usize },

    /// No hash can carry more leading zeros than it has hex characters.
    #[error("difficulty {difficulty} exceeds maximum of {max}")]
    InvalidDifficulty { difficulty: u32, max: u32 },

    /// Stored hash no longer matches the block contents.
    #[error("block {index} has a stale hash")]
    StaleHash { index: u64 },

    /// Block does not point at its predecessor's hash.
    #[error("block {index} has a broken previous-hash link")]
    BrokenLink { index: u64 },
}

impl ChainError {
    /// True for the two kinds `Chain::validate` reports.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::StaleHash { .. } | Self::BrokenLink { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

//! Error types for the ledger crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("hash chain broken at entry {index}: expected prev_hash {expected}, found {found}")]
    ChainBroken {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("entry {index} hash does not match its recorded content")]
    TamperedEntry { index: usize },

    #[error("buffer capacity of {limit} bytes exceeded")]
    CapacityExceeded { limit: usize },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors produced by ledger operations.
///
/// An invalid chain is not an error: validation reports it as a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    Validation(String),

    #[error("block not found at index {0}")]
    BlockNotFound(u64),

    #[error("difficulty {0} exceeds the 64 hex characters of a digest")]
    InvalidDifficulty(usize),

    #[error("snapshot contains no blocks")]
    EmptyChain,

    #[error("mining cancelled at nonce {nonce}")]
    MiningCancelled { nonce: u64 },

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<dtl_store::StoreError> for LedgerError {
    fn from(e: dtl_store::StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

use thiserror::Error;

use dtl_types::{DocumentId, UserId};

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("user {user} does not own document {document}")]
    Forbidden { document: DocumentId, user: UserId },

    #[error("document {0} has not been signed")]
    NotSigned(DocumentId),

    #[error("document {document} is already registered in block {block_index}")]
    AlreadyRegistered { document: DocumentId, block_index: u64 },

    #[error("encryption at rest is not configured")]
    EncryptionUnavailable,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] dtl_crypto::CryptoError),

    #[error("ledger error: {0}")]
    Ledger(#[from] dtl_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] dtl_store::StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TrustError {
    /// Returns `true` for every "it does not exist" outcome, whichever layer
    /// reported it.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::DocumentNotFound(_) => true,
            Self::Crypto(e) => e.is_not_found(),
            Self::Ledger(e) => matches!(e, dtl_ledger::LedgerError::BlockNotFound(_)),
            Self::Store(e) => matches!(e, dtl_store::StoreError::NotFound(_)),
            _ => false,
        }
    }
}

pub type TrustResult<T> = Result<T, TrustError>;

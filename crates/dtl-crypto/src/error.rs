use dtl_types::UserId;

/// Errors from key, certificate and signing operations.
///
/// Messages name the user id at most. Key bytes and storage paths never
/// appear in an error message.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// No key pair is stored for the user.
    #[error("key pair not found for user {0}")]
    KeyNotFound(UserId),

    /// No certificate is stored for the user.
    #[error("certificate not found for user {0}")]
    CertificateNotFound(UserId),

    /// The user id cannot address persisted key material.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),

    /// The RNG or key algorithm failed while generating a key pair.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The signature primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Certificate issuance failed below the certificate layer.
    #[error("certificate issuance failed for user {user}: {reason}")]
    CertificateIssuance { user: UserId, reason: String },

    /// Persisted key material could not be decoded.
    #[error("invalid key material for user {0}")]
    InvalidKeyMaterial(UserId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding key material was poisoned by a panicking holder.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    /// I/O error from the key store backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Returns `true` for the "not found" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_) | Self::CertificateNotFound(_))
    }
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

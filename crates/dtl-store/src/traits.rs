use dtl_types::UserId;

use crate::error::{StoreError, StoreResult};

/// Byte storage for uploaded documents.
///
/// - `read` returns the *current* bytes; there is no versioning.
/// - `write` overwrites whatever was stored under the name.
/// - Names are flat: no directories, no `..`.
pub trait ContentStore: Send + Sync {
    /// Read the stored bytes for `name`. Missing content is `NotFound`.
    fn read(&self, name: &str) -> StoreResult<Vec<u8>>;

    /// Store `data` under `name`, replacing previous content.
    fn write(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Check whether content exists under `name`.
    fn exists(&self, name: &str) -> StoreResult<bool>;
}

/// Optional encryption of document bytes at rest.
///
/// The owner id is passed so implementations can derive per-user keys.
pub trait AtRestCipher: Send + Sync {
    fn encrypt(&self, owner: &UserId, plaintext: &[u8]) -> StoreResult<Vec<u8>>;

    fn decrypt(&self, owner: &UserId, ciphertext: &[u8]) -> StoreResult<Vec<u8>>;
}

/// Reject names that could escape a flat namespace.
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let bad = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
        || name.contains('\0');
    if bad {
        return Err(StoreError::InvalidName(name.to_owned()));
    }
    Ok(())
}

//! Content-addressing primitives.
//!
//! Document digests are plain SHA-256 over the raw bytes, so anyone holding
//! the file can recompute them with standard tools.

use dtl_types::Digest;

use crate::error::{CryptoError, CryptoResult};

/// SHA-256 digest of raw bytes.
pub fn digest(data: &[u8]) -> Digest {
    Digest::of(data)
}

/// Returns `true` iff `digest(data) == *expected`.
pub fn verify_digest(data: &[u8], expected: &Digest) -> bool {
    digest(data) == *expected
}

/// SHA-256 digest of a value's JSON serialization.
pub fn digest_json<T: serde::Serialize>(value: &T) -> CryptoResult<Digest> {
    let data = serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(digest(&data))
}

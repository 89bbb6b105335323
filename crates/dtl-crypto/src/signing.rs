use std::sync::Arc;

use tracing::debug;

use dtl_types::UserId;

use crate::error::CryptoResult;
use crate::keystore::KeyStore;
use crate::signer::Signature;

/// Detached signatures over document bytes with a user's stored key pair.
///
/// A signature binds to the exact bytes that were signed. Callers verify
/// against the bytes as they are *now*; any later change to the content
/// makes verification fail.
#[derive(Clone)]
pub struct DocumentSigner {
    store: Arc<dyn KeyStore>,
}

impl DocumentSigner {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Sign `document` with the user's private key.
    ///
    /// Fails with `KeyNotFound` when the user has no key pair.
    pub fn sign(&self, document: &[u8], user: &UserId) -> CryptoResult<Signature> {
        let key = self.store.load_signing_key(user)?;
        let signature = key.sign(document)?;
        debug!(user = %user, len = document.len(), "document signed");
        Ok(signature)
    }

    /// Check `signature` over `document` with the user's public key.
    ///
    /// A mismatch is `Ok(false)`; only a missing key is an error.
    pub fn verify(&self, document: &[u8], signature: &Signature, user: &UserId) -> CryptoResult<bool> {
        let key = self.store.load_verifying_key(user)?;
        let valid = key.verify(document, signature).is_ok();
        debug!(user = %user, valid, "signature checked");
        Ok(valid)
    }
}

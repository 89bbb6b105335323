use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use tracing::info;

use dtl_types::UserId;

use crate::error::{StoreError, StoreResult};
use crate::traits::AtRestCipher;

/// Length of the master key and of every derived owner key.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KDF_SALT: &[u8] = b"dtl-at-rest-v1";

/// AES-256-GCM encryption of document bytes.
///
/// Each owner gets its own key, derived from one master key with
/// HKDF-SHA256 over the owner id. The owner id is also bound as associated
/// data, so content sealed for one owner never opens for another.
///
/// Sealed layout: `nonce (12) || ciphertext || tag (16)`, with a fresh random
/// nonce per call.
pub struct AesGcmCipher {
    master: [u8; KEY_LEN],
}

impl fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(master: [u8; KEY_LEN]) -> Self {
        Self { master }
    }

    pub fn generate() -> Self {
        let mut master = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut master);
        Self::new(master)
    }

    pub fn from_hex(s: &str) -> StoreResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|_| invalid_key())?;
        let master: [u8; KEY_LEN] = bytes.try_into().map_err(|_| invalid_key())?;
        Ok(Self::new(master))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.master)
    }

    /// Read the master key from `path`, generating and saving one on first
    /// use. The key file holds the key as hex.
    pub fn load_or_create(path: &Path) -> StoreResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_hex(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let cipher = Self::generate();
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p,
                    _ => Path::new("."),
                };
                fs::create_dir_all(dir)?;
                let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
                tmp.write_all(cipher.to_hex().as_bytes())?;
                tmp.as_file().sync_all()?;
                tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
                info!(path = %path.display(), "at-rest master key created");
                Ok(cipher)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn owner_cipher(&self, owner: &UserId) -> StoreResult<Aes256Gcm> {
        let mut key = [0u8; KEY_LEN];
        Hkdf::<Sha256>::new(Some(KDF_SALT), &self.master)
            .expand(owner.as_str().as_bytes(), &mut key)
            .map_err(|e| StoreError::Cipher(e.to_string()))?;
        Aes256Gcm::new_from_slice(&key).map_err(|e| StoreError::Cipher(e.to_string()))
    }
}

fn invalid_key() -> StoreError {
    StoreError::Cipher(format!("master key must be {KEY_LEN} bytes of hex"))
}

impl AtRestCipher for AesGcmCipher {
    fn encrypt(&self, owner: &UserId, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let cipher = self.owner_cipher(owner)?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let payload = Payload {
            msg: plaintext,
            aad: owner.as_str().as_bytes(),
        };
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| StoreError::Cipher("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, owner: &UserId, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(StoreError::Cipher("sealed content is truncated".into()));
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        let payload = Payload {
            msg: sealed,
            aad: owner.as_str().as_bytes(),
        };
        self.owner_cipher(owner)?
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| StoreError::Cipher("authentication failed".into()))
    }
}

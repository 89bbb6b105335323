use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use dtl_types::UserId;

use crate::certificate::Certificate;
use crate::error::{CryptoError, CryptoResult};
use crate::signer::{SigningKey, VerifyingKey};

/// Persistence for per-user key material and certificates.
///
/// All implementations must satisfy these invariants:
/// - Storing a key pair or certificate overwrites any previous one for the
///   same user. No rotation history is kept.
/// - A missing entry is reported as `KeyNotFound` / `CertificateNotFound`,
///   never as an I/O error.
/// - Private key material never leaves the store except through
///   `load_signing_key`.
pub trait KeyStore: Send + Sync {
    /// Persist both halves of a key pair for `user`.
    fn store_key_pair(&self, user: &UserId, signing: &SigningKey) -> CryptoResult<()>;

    /// Load the private half of the user's key pair.
    fn load_signing_key(&self, user: &UserId) -> CryptoResult<SigningKey>;

    /// Load the public half of the user's key pair.
    fn load_verifying_key(&self, user: &UserId) -> CryptoResult<VerifyingKey>;

    /// Persist the user's single active certificate.
    fn store_certificate(&self, certificate: &Certificate) -> CryptoResult<()>;

    /// Load the user's active certificate.
    fn load_certificate(&self, user: &UserId) -> CryptoResult<Certificate>;

    /// Returns `true` if a public key is stored for `user`.
    fn has_key_pair(&self, user: &UserId) -> CryptoResult<bool> {
        match self.load_verifying_key(user) {
            Ok(_) => Ok(true),
            Err(CryptoError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct MemoryEntry {
    secret: Option<[u8; 32]>,
    public: Option<[u8; 32]>,
    certificate: Option<Certificate>,
}

/// `HashMap`-backed key store for tests and embedding.
#[derive(Default)]
pub struct InMemoryKeyStore {
    entries: RwLock<HashMap<UserId, MemoryEntry>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> CryptoError {
    CryptoError::LockPoisoned("key store")
}

impl KeyStore for InMemoryKeyStore {
    fn store_key_pair(&self, user: &UserId, signing: &SigningKey) -> CryptoResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let entry = entries.entry(user.clone()).or_default();
        entry.secret = Some(*signing.as_bytes());
        entry.public = Some(signing.verifying_key().as_bytes());
        Ok(())
    }

    fn load_signing_key(&self, user: &UserId) -> CryptoResult<SigningKey> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        entries
            .get(user)
            .and_then(|e| e.secret)
            .map(SigningKey::from_bytes)
            .ok_or_else(|| CryptoError::KeyNotFound(user.clone()))
    }

    fn load_verifying_key(&self, user: &UserId) -> CryptoResult<VerifyingKey> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let bytes = entries
            .get(user)
            .and_then(|e| e.public)
            .ok_or_else(|| CryptoError::KeyNotFound(user.clone()))?;
        VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidKeyMaterial(user.clone()))
    }

    fn store_certificate(&self, certificate: &Certificate) -> CryptoResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries
            .entry(certificate.subject.user_id.clone())
            .or_default()
            .certificate = Some(certificate.clone());
        Ok(())
    }

    fn load_certificate(&self, user: &UserId) -> CryptoResult<Certificate> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        entries
            .get(user)
            .and_then(|e| e.certificate.clone())
            .ok_or_else(|| CryptoError::CertificateNotFound(user.clone()))
    }
}

/// Directory-backed key store.
///
/// Layout per user: `{user}_private.key` and `{user}_public.key` (hex text)
/// and `{user}_certificate.json`. Every write lands in a temporary file in
/// the same directory and is renamed over the target.
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    /// Open (creating if needed) a key store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> CryptoResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, user: &UserId, suffix: &str) -> CryptoResult<PathBuf> {
        if !user.is_path_safe() {
            return Err(CryptoError::InvalidUserId(user.as_str().to_owned()));
        }
        Ok(self.root.join(format!("{user}_{suffix}")))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> CryptoResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CryptoError::Io(e.error))?;
        Ok(())
    }

    fn read_optional(path: &Path) -> CryptoResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyStore for FileKeyStore {
    fn store_key_pair(&self, user: &UserId, signing: &SigningKey) -> CryptoResult<()> {
        let private_path = self.path_for(user, "private.key")?;
        let public_path = self.path_for(user, "public.key")?;
        self.write_atomic(&private_path, signing.to_hex().as_bytes())?;
        self.write_atomic(&public_path, signing.verifying_key().to_hex().as_bytes())?;
        Ok(())
    }

    fn load_signing_key(&self, user: &UserId) -> CryptoResult<SigningKey> {
        let path = self.path_for(user, "private.key")?;
        let text = Self::read_optional(&path)?.ok_or_else(|| CryptoError::KeyNotFound(user.clone()))?;
        SigningKey::from_hex(&text).map_err(|_| CryptoError::InvalidKeyMaterial(user.clone()))
    }

    fn load_verifying_key(&self, user: &UserId) -> CryptoResult<VerifyingKey> {
        let path = self.path_for(user, "public.key")?;
        let text = Self::read_optional(&path)?.ok_or_else(|| CryptoError::KeyNotFound(user.clone()))?;
        VerifyingKey::from_hex(&text).map_err(|_| CryptoError::InvalidKeyMaterial(user.clone()))
    }

    fn store_certificate(&self, certificate: &Certificate) -> CryptoResult<()> {
        let path = self.path_for(&certificate.subject.user_id, "certificate.json")?;
        let json = serde_json::to_vec_pretty(certificate)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        self.write_atomic(&path, &json)
    }

    fn load_certificate(&self, user: &UserId) -> CryptoResult<Certificate> {
        let path = self.path_for(user, "certificate.json")?;
        let text = Self::read_optional(&path)?
            .ok_or_else(|| CryptoError::CertificateNotFound(user.clone()))?;
        serde_json::from_str(&text).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{CertificateAuthority, SubjectInfo};

    fn exercise(store: &dyn KeyStore) {
        let user = UserId::new("u1");
        assert!(matches!(store.load_signing_key(&user), Err(CryptoError::KeyNotFound(_))));
        assert!(matches!(store.load_verifying_key(&user), Err(CryptoError::KeyNotFound(_))));
        assert!(!store.has_key_pair(&user).unwrap());

        let key = SigningKey::generate().unwrap();
        store.store_key_pair(&user, &key).unwrap();
        assert!(store.has_key_pair(&user).unwrap());
        assert_eq!(store.load_signing_key(&user).unwrap().as_bytes(), key.as_bytes());
        assert_eq!(store.load_verifying_key(&user).unwrap(), key.verifying_key());

        // Overwrite keeps only the newest pair.
        let newer = SigningKey::generate().unwrap();
        store.store_key_pair(&user, &newer).unwrap();
        assert_eq!(store.load_verifying_key(&user).unwrap(), newer.verifying_key());

        assert!(matches!(
            store.load_certificate(&user),
            Err(CryptoError::CertificateNotFound(_))
        ));
        let cert = CertificateAuthority::default()
            .issue(&user, &SubjectInfo::default(), &newer.verifying_key(), chrono::Utc::now())
            .unwrap();
        store.store_certificate(&cert).unwrap();
        assert_eq!(store.load_certificate(&user).unwrap(), cert);
    }

    #[test]
    fn in_memory_store() {
        exercise(&InMemoryKeyStore::new());
    }

    #[test]
    fn file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path().join("keys")).unwrap();
        exercise(&store);
        assert!(dir.path().join("keys/u1_private.key").exists());
        assert!(dir.path().join("keys/u1_public.key").exists());
        assert!(dir.path().join("keys/u1_certificate.json").exists());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::new("u2");
        let key = SigningKey::generate().unwrap();
        FileKeyStore::open(dir.path()).unwrap().store_key_pair(&user, &key).unwrap();

        let reopened = FileKeyStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load_verifying_key(&user).unwrap(), key.verifying_key());
    }

    #[test]
    fn file_store_rejects_unsafe_user_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();
        let err = store.load_signing_key(&UserId::new("../escape")).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidUserId(_)));
    }

    #[test]
    fn corrupt_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("u3_public.key"), "not a key").unwrap();
        let err = store.load_verifying_key(&UserId::new("u3")).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyMaterial(_)));
        assert!(!err.to_string().contains(dir.path().to_str().unwrap()));
    }
}

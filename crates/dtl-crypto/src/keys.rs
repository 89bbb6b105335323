use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use dtl_types::UserId;

use crate::certificate::{Certificate, CertificateAuthority, CertificateStatus, SubjectInfo};
use crate::error::{CryptoError, CryptoResult};
use crate::keystore::KeyStore;
use crate::signer::{SigningKey, VerifyingKey};

/// A freshly generated key pair bound to a user.
#[derive(Debug)]
pub struct KeyPair {
    pub user_id: UserId,
    pub signing: SigningKey,
    pub verifying: VerifyingKey,
}

/// Key generation, key lookup and certificate lifecycle for users.
///
/// Mutations for the same user id are serialized through a per-user lock so
/// two concurrent enrolments cannot interleave a key write with a
/// certificate write. The lock table only keeps entries that are in use:
/// idle ones are pruned whenever a lock is handed out.
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
    authority: CertificateAuthority,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self::with_authority(store, CertificateAuthority::default())
    }

    pub fn with_authority(store: Arc<dyn KeyStore>, authority: CertificateAuthority) -> Self {
        Self {
            store,
            authority,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn authority(&self) -> &CertificateAuthority {
        &self.authority
    }

    fn user_lock(&self, user: &UserId) -> CryptoResult<Arc<Mutex<()>>> {
        let mut locks = self
            .user_locks
            .lock()
            .map_err(|_| CryptoError::LockPoisoned("user lock table"))?;
        // An entry only the table references has no holder and no waiter.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks.entry(user.clone()).or_default().clone())
    }

    /// Generate and persist a new key pair, replacing any previous pair.
    pub fn generate_key_pair(&self, user: &UserId) -> CryptoResult<KeyPair> {
        let lock = self.user_lock(user)?;
        let _guard = lock.lock().map_err(|_| CryptoError::LockPoisoned("user"))?;
        self.generate_locked(user)
    }

    fn generate_locked(&self, user: &UserId) -> CryptoResult<KeyPair> {
        let signing = SigningKey::generate()?;
        self.store.store_key_pair(user, &signing)?;
        let verifying = signing.verifying_key();
        info!(user = %user, "key pair generated");
        Ok(KeyPair {
            user_id: user.clone(),
            signing,
            verifying,
        })
    }

    pub fn load_private_key(&self, user: &UserId) -> CryptoResult<SigningKey> {
        self.store.load_signing_key(user)
    }

    pub fn load_public_key(&self, user: &UserId) -> CryptoResult<VerifyingKey> {
        self.store.load_verifying_key(user)
    }

    /// Issue and persist a certificate, generating a key pair first if the
    /// user has none. Replaces any previous certificate.
    pub fn issue_certificate(&self, user: &UserId, info: &SubjectInfo) -> CryptoResult<Certificate> {
        let lock = self.user_lock(user)?;
        let _guard = lock.lock().map_err(|_| CryptoError::LockPoisoned("user"))?;
        self.issue_locked(user, info)
    }

    fn issue_locked(&self, user: &UserId, info: &SubjectInfo) -> CryptoResult<Certificate> {
        let public_key = match self.store.load_verifying_key(user) {
            Ok(key) => key,
            Err(CryptoError::KeyNotFound(_)) => {
                debug!(user = %user, "no key pair on file; generating one for issuance");
                self.generate_locked(user)
                    .map_err(|e| issuance(user, &e.to_string()))?
                    .verifying
            }
            Err(e) => return Err(issuance(user, &e.to_string())),
        };

        let certificate = self.authority.issue(user, info, &public_key, Utc::now())?;
        self.store.store_certificate(&certificate)?;
        info!(user = %user, serial = %certificate.serial_number, "certificate issued");
        Ok(certificate)
    }

    /// Generate a fresh key pair and issue a certificate for it.
    pub fn enroll(&self, user: &UserId, info: &SubjectInfo) -> CryptoResult<Certificate> {
        let lock = self.user_lock(user)?;
        let _guard = lock.lock().map_err(|_| CryptoError::LockPoisoned("user"))?;
        self.generate_locked(user)?;
        self.issue_locked(user, info)
    }

    pub fn load_certificate(&self, user: &UserId) -> CryptoResult<Certificate> {
        self.store.load_certificate(user)
    }

    /// Self-signature and time-window check against the wall clock.
    pub fn verify_certificate(&self, certificate: &Certificate) -> bool {
        CertificateAuthority::verify(certificate)
    }

    pub fn verify_certificate_at(&self, certificate: &Certificate, now: DateTime<Utc>) -> bool {
        CertificateAuthority::verify_at(certificate, now)
    }

    /// Load the user's certificate together with its current validity.
    pub fn certificate_status(&self, user: &UserId) -> CryptoResult<CertificateStatus> {
        let certificate = self.load_certificate(user)?;
        let valid = self.verify_certificate(&certificate);
        Ok(CertificateStatus { certificate, valid })
    }
}

fn issuance(user: &UserId, reason: &str) -> CryptoError {
    CryptoError::CertificateIssuance {
        user: user.clone(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::keystore::InMemoryKeyStore;

    fn manager() -> KeyManager {
        KeyManager::new(Arc::new(InMemoryKeyStore::new()))
    }

    #[test]
    fn generate_then_load() {
        let km = manager();
        let user = UserId::new("u1");
        let pair = km.generate_key_pair(&user).unwrap();
        assert_eq!(km.load_public_key(&user).unwrap(), pair.verifying);
        assert_eq!(km.load_private_key(&user).unwrap().as_bytes(), pair.signing.as_bytes());
    }

    #[test]
    fn loading_missing_keys_is_not_found() {
        let km = manager();
        let err = km.load_private_key(&UserId::new("ghost")).unwrap_err();
        assert!(err.is_not_found());
        let err = km.load_certificate(&UserId::new("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn issuing_without_keys_generates_them() {
        let km = manager();
        let user = UserId::new("u2");
        let cert = km.issue_certificate(&user, &SubjectInfo::default()).unwrap();
        assert_eq!(km.load_public_key(&user).unwrap().to_hex(), cert.public_key);
        assert!(km.verify_certificate(&cert));
    }

    #[test]
    fn issuing_reuses_existing_keys() {
        let km = manager();
        let user = UserId::new("u3");
        let pair = km.generate_key_pair(&user).unwrap();
        let cert = km.issue_certificate(&user, &SubjectInfo::default()).unwrap();
        assert_eq!(cert.public_key, pair.verifying.to_hex());
    }

    #[test]
    fn single_active_certificate() {
        let km = manager();
        let user = UserId::new("u4");
        km.issue_certificate(&user, &SubjectInfo::default()).unwrap();
        let second = km.issue_certificate(&user, &SubjectInfo::new("bob", "b@x")).unwrap();
        assert_eq!(km.load_certificate(&user).unwrap(), second);
    }

    #[test]
    fn verification_uses_supplied_clock() {
        let km = manager();
        let cert = km.issue_certificate(&UserId::new("u7"), &SubjectInfo::default()).unwrap();
        let after_expiry = cert.validity.not_after + chrono::Duration::seconds(1);
        assert!(km.verify_certificate_at(&cert, cert.validity.not_before));
        assert!(!km.verify_certificate_at(&cert, after_expiry));
    }

    #[test]
    fn enroll_rotates_key_and_certificate() {
        let km = manager();
        let user = UserId::new("u5");
        let first = km.enroll(&user, &SubjectInfo::default()).unwrap();
        let second = km.enroll(&user, &SubjectInfo::default()).unwrap();
        assert_ne!(first.public_key, second.public_key);
        let status = km.certificate_status(&user).unwrap();
        assert!(status.valid);
        assert_eq!(status.certificate, second);
    }

    #[test]
    fn idle_user_locks_are_pruned() {
        let km = manager();
        for i in 0..100 {
            km.generate_key_pair(&UserId::new(format!("user{i}"))).unwrap();
            assert!(km.user_locks.lock().unwrap().len() <= 1);
        }
        let held = km.user_lock(&UserId::new("held")).unwrap();
        km.enroll(&UserId::new("other"), &SubjectInfo::default()).unwrap();
        let table = km.user_locks.lock().unwrap();
        assert!(table.contains_key(&UserId::new("held")));
        assert!(table.len() <= 2);
        drop(table);
        drop(held);
    }

    #[test]
    fn poisoned_user_lock_is_reported() {
        let km = Arc::new(manager());
        let user = UserId::new("u8");
        let lock = km.user_lock(&user).unwrap();
        let poison = Arc::clone(&lock);
        let _ = thread::spawn(move || {
            let _guard = poison.lock().unwrap();
            panic!("poison the user lock");
        })
        .join();
        let err = km.generate_key_pair(&user).unwrap_err();
        assert!(matches!(err, CryptoError::LockPoisoned(_)));
        drop(lock);
    }

    #[test]
    fn concurrent_issuance_for_one_user_stays_consistent() {
        let km = Arc::new(manager());
        let user = UserId::new("u6");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let km = Arc::clone(&km);
                let user = user.clone();
                thread::spawn(move || km.enroll(&user, &SubjectInfo::default()).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let cert = km.load_certificate(&user).unwrap();
        assert_eq!(cert.public_key, km.load_public_key(&user).unwrap().to_hex());
        assert!(km.verify_certificate(&cert));
    }
}

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use dtl_crypto::{
    verify_digest, Certificate, CertificateStatus, DocumentSigner, InMemoryKeyStore, KeyManager,
    KeyStore, SubjectInfo,
};
use dtl_ledger::{Blockchain, SharedLedger, Transaction, TransactionView};
use dtl_store::{AtRestCipher, ContentStore, InMemoryContentStore, StoreError};
use dtl_types::{DocumentId, UserId};

use crate::document::{Document, Registration, SignReceipt, VerificationReport};
use crate::error::{TrustError, TrustResult};
use crate::repository::{DocumentRepository, InMemoryDocumentRepository};

/// Per-document lifecycle: upload, sign, verify, register.
///
/// Sign and register are read-modify-write sequences on a document record
/// and are serialized against each other. Ledger appends are serialized by
/// the [`SharedLedger`] itself.
pub struct DocumentTrust {
    keys: KeyManager,
    signer: DocumentSigner,
    content: Arc<dyn ContentStore>,
    documents: Arc<dyn DocumentRepository>,
    ledger: SharedLedger,
    cipher: Option<Arc<dyn AtRestCipher>>,
    mutation_lock: Mutex<()>,
}

impl DocumentTrust {
    pub fn new(
        key_store: Arc<dyn KeyStore>,
        content: Arc<dyn ContentStore>,
        documents: Arc<dyn DocumentRepository>,
        ledger: SharedLedger,
    ) -> Self {
        Self {
            keys: KeyManager::new(Arc::clone(&key_store)),
            signer: DocumentSigner::new(key_store),
            content,
            documents,
            ledger,
            cipher: None,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Everything in memory, for tests and embedding.
    pub fn in_memory(difficulty: usize) -> TrustResult<Self> {
        Ok(Self::new(
            Arc::new(InMemoryKeyStore::new()),
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryDocumentRepository::new()),
            SharedLedger::new(Blockchain::with_difficulty(difficulty)?),
        ))
    }

    /// Enable `encrypt = true` uploads.
    pub fn with_cipher(mut self, cipher: Arc<dyn AtRestCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    fn lock(&self) -> TrustResult<MutexGuard<'_, ()>> {
        self.mutation_lock
            .lock()
            .map_err(|_| TrustError::Internal("document lock poisoned".into()))
    }

    /// Generate a key pair for `user` and issue its certificate.
    pub fn enroll(&self, user: &UserId, subject: &SubjectInfo) -> TrustResult<Certificate> {
        if user.is_blank() {
            return Err(TrustError::InvalidInput("user id must not be blank".into()));
        }
        Ok(self.keys.enroll(user, subject)?)
    }

    pub fn certificate_status(&self, user: &UserId) -> TrustResult<CertificateStatus> {
        Ok(self.keys.certificate_status(user)?)
    }

    /// Store `content` for `caller`.
    ///
    /// The digest is taken over the bytes as given, before encryption.
    pub fn upload(
        &self,
        caller: &UserId,
        original_name: &str,
        content: &[u8],
        encrypt: bool,
    ) -> TrustResult<Document> {
        if caller.is_blank() {
            return Err(TrustError::InvalidInput("user id must not be blank".into()));
        }
        let name = flat_name(original_name);
        if name.is_empty() {
            return Err(TrustError::InvalidInput("document name must not be blank".into()));
        }

        let document = Document::new(name, caller.clone(), content, encrypt);

        if encrypt {
            let cipher = self.cipher.as_ref().ok_or(TrustError::EncryptionUnavailable)?;
            let sealed = cipher.encrypt(caller, content)?;
            self.content.write(&document.filename, &sealed)?;
        } else {
            self.content.write(&document.filename, content)?;
        }
        self.documents.save(&document)?;

        info!(
            document = %document.id,
            owner = %caller,
            size = document.size,
            encrypted = encrypt,
            "document uploaded"
        );
        Ok(document)
    }

    pub fn document(&self, id: &DocumentId) -> TrustResult<Document> {
        self.documents
            .get(id)?
            .ok_or_else(|| TrustError::DocumentNotFound(id.clone()))
    }

    pub fn documents_for(&self, owner: &UserId) -> TrustResult<Vec<Document>> {
        self.documents.list_for_owner(owner)
    }

    fn owned_document(&self, caller: &UserId, id: &DocumentId) -> TrustResult<Document> {
        let document = self.document(id)?;
        if !document.is_owned_by(caller) {
            return Err(TrustError::Forbidden {
                document: id.clone(),
                user: caller.clone(),
            });
        }
        Ok(document)
    }

    /// The document's bytes as they are now, decrypted if stored encrypted.
    fn current_bytes(&self, document: &Document) -> TrustResult<Vec<u8>> {
        let stored = self.content.read(&document.filename)?;
        if !document.encrypted {
            return Ok(stored);
        }
        let cipher = self.cipher.as_ref().ok_or(TrustError::EncryptionUnavailable)?;
        Ok(cipher.decrypt(&document.user_id, &stored)?)
    }

    /// The owner's copy of the document bytes, decrypted.
    pub fn download(&self, caller: &UserId, id: &DocumentId) -> TrustResult<(Document, Vec<u8>)> {
        let document = self.owned_document(caller, id)?;
        let bytes = self.current_bytes(&document)?;
        Ok((document, bytes))
    }

    /// Sign the document's current bytes with the owner's key.
    pub fn sign(&self, caller: &UserId, id: &DocumentId) -> TrustResult<SignReceipt> {
        let _guard = self.lock()?;
        let mut document = self.owned_document(caller, id)?;
        let bytes = self.current_bytes(&document)?;
        let signature = self.signer.sign(&bytes, caller)?;
        let signed_at = Utc::now();
        document.mark_signed(signature.clone(), signed_at);
        self.documents.save(&document)?;

        info!(document = %id, signer = %caller, "document signed");
        Ok(SignReceipt {
            document_id: id.clone(),
            signature,
            signed_at,
        })
    }

    /// Check the signature and the upload digest against the current bytes.
    ///
    /// Mismatches are reported in the result, not as errors. Sealed content
    /// that no longer authenticates counts as a mismatch of both checks.
    pub fn verify(&self, id: &DocumentId) -> TrustResult<VerificationReport> {
        let document = self.document(id)?;
        let signature = match (&document.signature, document.signed) {
            (Some(signature), true) => signature,
            _ => return Err(TrustError::NotSigned(id.clone())),
        };
        let (signature_valid, hash_valid) = match self.current_bytes(&document) {
            Ok(bytes) => (
                self.signer.verify(&bytes, signature, &document.user_id)?,
                verify_digest(&bytes, &document.hash),
            ),
            Err(TrustError::Store(StoreError::Cipher(reason))) => {
                warn!(document = %id, %reason, "sealed content does not authenticate");
                (false, false)
            }
            Err(e) => return Err(e),
        };

        debug!(document = %id, signature_valid, hash_valid, "document verified");
        Ok(VerificationReport {
            document_id: id.clone(),
            signature_valid,
            hash_valid,
            verified: signature_valid && hash_valid,
            signed_by: document.user_id,
            signed_at: document.signed_at,
        })
    }

    /// Record a signed document as a ledger transaction in its own block.
    pub fn register(&self, caller: &UserId, id: &DocumentId) -> TrustResult<Registration> {
        self.register_cancellable(caller, id, &AtomicBool::new(false))
    }

    pub fn register_cancellable(
        &self,
        caller: &UserId,
        id: &DocumentId,
        cancel: &AtomicBool,
    ) -> TrustResult<Registration> {
        let _guard = self.lock()?;
        let mut document = self.owned_document(caller, id)?;
        let signature = match (&document.signature, document.signed) {
            (Some(signature), true) => signature.clone(),
            _ => return Err(TrustError::NotSigned(id.clone())),
        };
        if let (true, Some(block_index)) =
            (document.registered_in_ledger, document.ledger_block_index)
        {
            return Err(TrustError::AlreadyRegistered {
                document: id.clone(),
                block_index,
            });
        }

        let transaction = Transaction::document_registration(
            document.id.clone(),
            document.original_name.clone(),
            document.hash,
            document.user_id.clone(),
            signature,
        );
        let block = self.ledger.add_block_cancellable(transaction, cancel)?;
        document.mark_registered(block.index);
        self.documents.save(&document)?;

        info!(document = %id, block = block.index, "document registered");
        Ok(Registration {
            block_index: block.index,
            block_hash: block.hash,
            document,
        })
    }

    /// Ledger transactions recorded for the document, in chain order.
    pub fn history(&self, id: &DocumentId) -> TrustResult<Vec<TransactionView>> {
        Ok(self.ledger.find_transactions_by_document_id(id)?)
    }

    /// Certificate of the user who signed the document.
    pub fn signer_certificate(&self, id: &DocumentId) -> TrustResult<Certificate> {
        let document = self.document(id)?;
        if !document.signed {
            return Err(TrustError::NotSigned(id.clone()));
        }
        Ok(self.keys.load_certificate(&document.user_id)?)
    }

    /// Overwrite a document's stored bytes. Digest and signature are left as
    /// they were, so later verification reports the change.
    pub fn replace_content(&self, caller: &UserId, id: &DocumentId, content: &[u8]) -> TrustResult<()> {
        let document = self.owned_document(caller, id)?;
        if document.encrypted {
            let cipher = self.cipher.as_ref().ok_or(TrustError::EncryptionUnavailable)?;
            self.content
                .write(&document.filename, &cipher.encrypt(caller, content)?)?;
        } else {
            self.content.write(&document.filename, content)?;
        }
        debug!(document = %id, "document content replaced");
        Ok(())
    }
}

/// Last path component of a client-supplied name.
fn flat_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('.')
        .to_owned()
}

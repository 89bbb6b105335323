use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dtl_crypto::Signature;
use dtl_types::{Digest, DocumentId, UserId};

/// An uploaded document and its trust lifecycle.
///
/// `hash` is the digest of the original bytes, taken before any at-rest
/// encryption. `signed` implies `signature` and `signed_at` are set;
/// `registered_in_ledger` implies `ledger_block_index` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    /// Name of the stored content: `{id}-{original_name}`.
    pub filename: String,
    pub original_name: String,
    /// Owner.
    pub user_id: UserId,
    pub hash: Digest,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub encrypted: bool,
    pub signed: bool,
    pub signature: Option<Signature>,
    pub signed_at: Option<DateTime<Utc>>,
    pub registered_in_ledger: bool,
    pub ledger_block_index: Option<u64>,
}

impl Document {
    /// A fresh record under a new id. The stored filename embeds the id, so
    /// two uploads never share content even when their names match.
    pub fn new(
        original_name: impl Into<String>,
        owner: UserId,
        content: &[u8],
        encrypted: bool,
    ) -> Self {
        let id = DocumentId::generate();
        let original_name = original_name.into();
        Self {
            filename: format!("{id}-{original_name}"),
            id,
            original_name,
            user_id: owner,
            hash: Digest::of(content),
            size: content.len() as u64,
            uploaded_at: Utc::now(),
            encrypted,
            signed: false,
            signature: None,
            signed_at: None,
            registered_in_ledger: false,
            ledger_block_index: None,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    pub fn mark_signed(&mut self, signature: Signature, at: DateTime<Utc>) {
        self.signed = true;
        self.signature = Some(signature);
        self.signed_at = Some(at);
    }

    pub fn mark_registered(&mut self, block_index: u64) {
        self.registered_in_ledger = true;
        self.ledger_block_index = Some(block_index);
    }
}

/// Outcome of signing a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignReceipt {
    pub document_id: DocumentId,
    pub signature: Signature,
    pub signed_at: DateTime<Utc>,
}

/// The two independent integrity checks of a signed document.
///
/// The signature binds to the bytes as they were when signed; the digest
/// binds to the bytes as they were at upload. Either can fail alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub document_id: DocumentId,
    pub signature_valid: bool,
    pub hash_valid: bool,
    pub verified: bool,
    pub signed_by: UserId,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Where a registered document landed in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub block_index: u64,
    pub block_hash: Digest,
    pub document: Document,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_digests_content() {
        let doc = Document::new("a.txt", UserId::new("u1"), b"hello", false);
        assert_eq!(doc.hash, Digest::of(b"hello"));
        assert_eq!(doc.size, 5);
        assert!(!doc.signed);
        assert!(doc.signature.is_none());
        assert!(!doc.registered_in_ledger);
        assert!(doc.is_owned_by(&UserId::new("u1")));
        assert!(!doc.is_owned_by(&UserId::new("u2")));
        assert_eq!(doc.filename, format!("{}-a.txt", doc.id));
    }

    #[test]
    fn same_name_gets_distinct_filenames() {
        let a = Document::new("a.txt", UserId::new("u1"), b"one", false);
        let b = Document::new("a.txt", UserId::new("u1"), b"two", false);
        assert_ne!(a.id, b.id);
        assert_ne!(a.filename, b.filename);
    }

    #[test]
    fn lifecycle_marks() {
        let key = dtl_crypto::SigningKey::generate().unwrap();
        let mut doc = Document::new("a.txt", UserId::new("u1"), b"hello", false);
        let at = Utc::now();
        doc.mark_signed(key.sign(b"hello").unwrap(), at);
        assert!(doc.signed);
        assert_eq!(doc.signed_at, Some(at));

        doc.mark_registered(4);
        assert!(doc.registered_in_ledger);
        assert_eq!(doc.ledger_block_index, Some(4));
    }

    #[test]
    fn json_uses_camel_case() {
        let doc = Document::new("a.txt", UserId::new("u1"), b"hello", true);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["originalName"], "a.txt");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["registeredInLedger"], false);
        assert!(json["ledgerBlockIndex"].is_null());
        assert_eq!(json["encrypted"], true);
    }
}

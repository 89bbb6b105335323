use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dtl_crypto::Signature;
use dtl_types::{Digest, DocumentId, UserId};

use crate::error::{LedgerError, LedgerResult};

/// What a ledger transaction records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    DocumentRegistration,
}

/// A ledger entry asserting that a signed document hash existed at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub document_id: DocumentId,
    pub document_name: String,
    pub document_hash: Digest,
    pub user_id: UserId,
    pub signature: Signature,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// A `document_registration` transaction stamped with the current time.
    pub fn document_registration(
        document_id: DocumentId,
        document_name: impl Into<String>,
        document_hash: Digest,
        user_id: UserId,
        signature: Signature,
    ) -> Self {
        Self {
            kind: TransactionKind::DocumentRegistration,
            document_id,
            document_name: document_name.into(),
            document_hash,
            user_id,
            signature,
            timestamp: Utc::now(),
        }
    }

    /// Reject transactions that cannot be attributed or looked up.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.document_id.is_blank() {
            return Err(LedgerError::Validation("documentId must not be blank".into()));
        }
        if self.user_id.is_blank() {
            return Err(LedgerError::Validation("userId must not be blank".into()));
        }
        Ok(())
    }
}

/// A mined transaction decorated with where it landed in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub block_index: u64,
    pub block_hash: Digest,
    /// Creation time of the containing block, in milliseconds.
    pub block_timestamp: u64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use dtl_crypto::SigningKey;

    use super::*;

    pub fn registration(document: &str, user: &str) -> Transaction {
        let key = SigningKey::generate().unwrap();
        let content = format!("content of {document}");
        Transaction::document_registration(
            DocumentId::new(document),
            format!("{document}.pdf"),
            Digest::of(content.as_bytes()),
            UserId::new(user),
            key.sign(content.as_bytes()).unwrap(),
        )
    }
}

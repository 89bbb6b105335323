//! Document trust orchestration for the Document Trust Ledger.
//!
//! [`DocumentTrust`] sequences the per-document lifecycle on top of the
//! lower crates: digest at upload, owner-only signing, independent
//! signature and digest verification, and registration of signed documents
//! as ledger transactions.
//!
//! The caller identity passed to every operation is trusted as given. How
//! it was established is the request layer's concern.

pub mod document;
pub mod error;
pub mod repository;
pub mod service;

pub use document::{Document, Registration, SignReceipt, VerificationReport};
pub use error::{TrustError, TrustResult};
pub use repository::{
    DocumentDatabase, DocumentRepository, InMemoryDocumentRepository, JsonDocumentRepository,
};
pub use service::DocumentTrust;

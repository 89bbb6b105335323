//! Foundation types for the Document Trust Ledger (DTL).
//!
//! Every other DTL crate depends on `dtl-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: SHA-256 content fingerprint, hex-encoded for display
//! - [`UserId`]: identity of an authenticated caller, as supplied by the request layer
//! - [`DocumentId`]: identifier of an uploaded document (UUID v7 when generated)

pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use digest::Digest;
pub use error::TypeError;
pub use identity::{DocumentId, UserId};
pub use temporal::now_ms;

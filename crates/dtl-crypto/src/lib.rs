//! Cryptographic primitives for the Document Trust Ledger.
//!
//! Provides SHA-256 content digests, Ed25519 key pairs bound to user ids,
//! self-signed certificates, and detached signatures over document bytes.
//!
//! All crypto operations wrap established libraries. No custom cryptography.
//!
//! # Trust model
//!
//! Certificates are self-signed: the "signature" is a SHA-256 digest over the
//! subject, validity window and public key, computed by the local process.
//! There is no chain to an external root; real trust guarantees need a
//! proper CA-chain model.

pub mod certificate;
pub mod error;
pub mod hasher;
pub mod keys;
pub mod keystore;
pub mod signer;
pub mod signing;

pub use certificate::{
    Certificate, CertificateAuthority, CertificateStatus, IssuerInfo, SubjectInfo, SubjectName,
    Validity,
};
pub use error::{CryptoError, CryptoResult};
pub use hasher::{digest, digest_json, verify_digest};
pub use keys::{KeyManager, KeyPair};
pub use keystore::{FileKeyStore, InMemoryKeyStore, KeyStore};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
pub use signing::DocumentSigner;

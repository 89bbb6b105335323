//! Storage boundary for the Document Trust Ledger.
//!
//! The trust core never touches the file system directly. It reads and
//! writes document bytes through a [`ContentStore`], and persists structured
//! records as whole JSON snapshots through [`JsonSnapshotFile`].
//!
//! # Storage Backends
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsContentStore`] -- one file per document under a root directory
//!
//! Document bytes may be sealed before they reach a store with
//! [`AesGcmCipher`], which implements [`AtRestCipher`].
//!
//! # Design Rules
//!
//! 1. Content is keyed by its stored file name; the store never interprets it.
//! 2. Snapshots are read whole and overwritten whole (last writer wins).
//! 3. Overwrites go through a temporary file and an atomic rename.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod cipher;
pub mod error;
pub mod fs;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use cipher::AesGcmCipher;
pub use error::{StoreError, StoreResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use snapshot::JsonSnapshotFile;
pub use traits::{AtRestCipher, ContentStore};

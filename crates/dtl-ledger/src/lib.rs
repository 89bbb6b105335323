//! Append-only proof-of-work ledger for the Document Trust Ledger (DTL).
//!
//! This crate is the heart of DTL. It provides:
//! - [`Block`] with its content hash, linkage hash and nonce search
//! - [`Blockchain`]: genesis, pending-transaction staging, mining, lookup, stats
//! - [`ChainValidator`]: the integrity walk, as a boolean and as a full report
//! - [`SharedLedger`]: the one process-wide handle, guarded by a `RwLock`
//! - [`ChainSnapshot`] / [`ChainFile`]: the JSON form of the chain
//!
//! A single process owns the chain. There is no consensus, no block
//! propagation and no fork resolution.

pub mod block;
pub mod chain;
pub mod config;
pub mod error;
pub mod shared;
pub mod snapshot;
pub mod transaction;
pub mod validation;

pub use block::{Block, BlockPayload, GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH};
pub use chain::{Blockchain, ChainStats};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use shared::SharedLedger;
pub use snapshot::{ChainFile, ChainSnapshot};
pub use transaction::{Transaction, TransactionKind, TransactionView};
pub use validation::{ChainValidator, ValidationReport, ValidityStatus, Violation, ViolationKind};

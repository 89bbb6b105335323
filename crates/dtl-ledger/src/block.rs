use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use dtl_types::Digest;

use crate::error::{LedgerError, LedgerResult};
use crate::transaction::Transaction;

/// `previous_hash` sentinel of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Payload message of the genesis block.
pub const GENESIS_MESSAGE: &str = "Genesis block - Document Trust Ledger";

/// What a block carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum BlockPayload {
    Genesis { message: String },
    Single(Transaction),
    Batch(Vec<Transaction>),
}

impl BlockPayload {
    pub fn genesis() -> Self {
        Self::Genesis {
            message: GENESIS_MESSAGE.into(),
        }
    }

    /// Transactions carried by this payload. Genesis carries none.
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            Self::Genesis { .. } => &[],
            Self::Single(tx) => std::slice::from_ref(tx),
            Self::Batch(txs) => txs,
        }
    }
}

/// One link of the chain.
///
/// `hash` is SHA-256 over the decimal index, the previous hash, the decimal
/// timestamp, the JSON form of `data` and the decimal nonce, concatenated
/// in that order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub data: BlockPayload,
    pub previous_hash: String,
    pub hash: Digest,
    pub nonce: u64,
}

impl Block {
    /// Build a block at nonce 0 with its hash already computed.
    pub fn new(
        index: u64,
        timestamp: u64,
        data: BlockPayload,
        previous_hash: impl Into<String>,
    ) -> LedgerResult<Self> {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            hash: Digest::zero(),
            nonce: 0,
        };
        block.hash = block.recompute_hash()?;
        Ok(block)
    }

    /// The unmined genesis block.
    pub fn genesis(timestamp: u64) -> LedgerResult<Self> {
        Self::new(0, timestamp, BlockPayload::genesis(), GENESIS_PREVIOUS_HASH)
    }

    /// Every hashed field except the nonce, already concatenated.
    fn hash_prefix(&self) -> LedgerResult<String> {
        let data = serde_json::to_string(&self.data)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(format!(
            "{}{}{}{}",
            self.index, self.previous_hash, self.timestamp, data
        ))
    }

    fn hash_with_nonce(prefix: &str, nonce: u64) -> Digest {
        Digest::of(format!("{prefix}{nonce}").as_bytes())
    }

    /// Hash of the current field values. Pure; does not touch `self.hash`.
    pub fn recompute_hash(&self) -> LedgerResult<Digest> {
        Ok(Self::hash_with_nonce(&self.hash_prefix()?, self.nonce))
    }

    /// Returns `true` if the stored hash matches the current field values.
    pub fn is_hash_consistent(&self) -> bool {
        matches!(self.recompute_hash(), Ok(h) if h == self.hash)
    }

    /// Increment the nonce until the hash has `difficulty` leading hex zeros.
    pub fn mine(&mut self, difficulty: usize) -> LedgerResult<()> {
        self.mine_cancellable(difficulty, &AtomicBool::new(false))
    }

    /// Like [`mine`](Self::mine), but stops with `MiningCancelled` once
    /// `cancel` is set. A cancelled block keeps its last tried nonce and
    /// must not be appended.
    pub fn mine_cancellable(&mut self, difficulty: usize, cancel: &AtomicBool) -> LedgerResult<()> {
        if difficulty > Digest::HEX_LEN {
            return Err(LedgerError::InvalidDifficulty(difficulty));
        }
        let prefix = self.hash_prefix()?;
        let mut hash = Self::hash_with_nonce(&prefix, self.nonce);
        while !hash.meets_difficulty(difficulty) {
            if cancel.load(Ordering::Relaxed) {
                self.hash = hash;
                return Err(LedgerError::MiningCancelled { nonce: self.nonce });
            }
            self.nonce += 1;
            hash = Self::hash_with_nonce(&prefix, self.nonce);
        }
        self.hash = hash;
        debug!(
            index = self.index,
            nonce = self.nonce,
            hash = %self.hash.short_hex(),
            "block mined"
        );
        Ok(())
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.data.transactions()
    }
}

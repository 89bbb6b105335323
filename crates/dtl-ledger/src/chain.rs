use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dtl_types::{now_ms, DocumentId};

use crate::block::{Block, BlockPayload};
use crate::config::{LedgerConfig, MAX_DIFFICULTY};
use crate::error::{LedgerError, LedgerResult};
use crate::snapshot::ChainSnapshot;
use crate::transaction::{Transaction, TransactionView};
use crate::validation::{ChainValidator, ValidationReport, ValidityStatus};

/// Summary of the chain for status displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStats {
    pub total_blocks: usize,
    pub difficulty: usize,
    pub pending_transactions: usize,
    pub is_valid: bool,
    pub latest_block: Block,
}

/// The ordered block sequence plus the transactions waiting to be mined.
///
/// Invariants:
/// - `blocks` is never empty; index 0 is genesis.
/// - Every appended block links to its predecessor and meets `difficulty`
///   at the moment it is appended.
/// - Blocks are only ever appended.
#[derive(Clone, Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: usize,
    pending: Vec<Transaction>,
}

impl Blockchain {
    /// A fresh chain with only genesis, at the default difficulty.
    pub fn new() -> LedgerResult<Self> {
        Self::from_config(&LedgerConfig::default())
    }

    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        Self::with_difficulty(config.difficulty)
    }

    pub fn with_difficulty(difficulty: usize) -> LedgerResult<Self> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(difficulty));
        }
        let genesis = Block::genesis(now_ms())?;
        info!(difficulty, genesis = %genesis.hash.short_hex(), "chain created");
        Ok(Self {
            blocks: vec![genesis],
            difficulty,
            pending: Vec::new(),
        })
    }

    /// Rebuild a chain from its persisted form.
    ///
    /// The snapshot is taken as-is; tampering shows up in [`is_valid`](Self::is_valid).
    pub fn from_snapshot(snapshot: ChainSnapshot) -> LedgerResult<Self> {
        if snapshot.chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        if snapshot.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(snapshot.difficulty));
        }
        Ok(Self {
            blocks: snapshot.chain,
            difficulty: snapshot.difficulty,
            pending: snapshot.pending_transactions,
        })
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            chain: self.blocks.clone(),
            difficulty: self.difficulty,
            pending_transactions: self.pending.clone(),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`: genesis is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> &Block {
        // Non-empty by construction.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block(&self, index: u64) -> LedgerResult<&Block> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.blocks.get(i))
            .ok_or(LedgerError::BlockNotFound(index))
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    /// Append a transaction to the pending list without mining.
    pub fn stage_transaction(&mut self, transaction: Transaction) -> LedgerResult<()> {
        transaction.validate()?;
        debug!(
            document = %transaction.document_id,
            pending = self.pending.len() + 1,
            "transaction staged"
        );
        self.pending.push(transaction);
        Ok(())
    }

    fn next_block(&self, data: BlockPayload) -> LedgerResult<Block> {
        let latest = self.latest_block();
        Block::new(latest.index + 1, now_ms(), data, latest.hash.to_hex())
    }

    /// Mine every pending transaction into one block.
    ///
    /// Returns `None` when nothing is pending. On success the pending list
    /// is cleared and the mined transactions are returned.
    pub fn mine_pending_transactions(&mut self) -> LedgerResult<Option<Vec<Transaction>>> {
        self.mine_pending_transactions_cancellable(&AtomicBool::new(false))
    }

    /// Cancellation leaves the chain and the pending list untouched.
    pub fn mine_pending_transactions_cancellable(
        &mut self,
        cancel: &AtomicBool,
    ) -> LedgerResult<Option<Vec<Transaction>>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let mut block = self.next_block(BlockPayload::Batch(self.pending.clone()))?;
        block.mine_cancellable(self.difficulty, cancel)?;
        info!(
            index = block.index,
            transactions = self.pending.len(),
            nonce = block.nonce,
            "pending transactions mined"
        );
        self.blocks.push(block);
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// Mine a block holding exactly one transaction, bypassing the pending list.
    pub fn add_block(&mut self, transaction: Transaction) -> LedgerResult<Block> {
        self.add_block_cancellable(transaction, &AtomicBool::new(false))
    }

    pub fn add_block_cancellable(
        &mut self,
        transaction: Transaction,
        cancel: &AtomicBool,
    ) -> LedgerResult<Block> {
        transaction.validate()?;
        let document = transaction.document_id.clone();
        let mut block = self.next_block(BlockPayload::Single(transaction))?;
        block.mine_cancellable(self.difficulty, cancel)?;
        info!(
            index = block.index,
            document = %document,
            nonce = block.nonce,
            "block added"
        );
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Walk the chain and report whether it is intact.
    pub fn is_valid(&self) -> bool {
        ChainValidator::is_valid(&self.blocks, self.difficulty)
    }

    pub fn validity(&self) -> ValidityStatus {
        ValidityStatus::from_valid(self.is_valid())
    }

    pub fn validation_report(&self) -> ValidationReport {
        ChainValidator::validate(&self.blocks, self.difficulty)
    }

    /// Every mined transaction for `document`, in chain order.
    ///
    /// Genesis is skipped. Pending transactions are not included.
    pub fn find_transactions_by_document_id(&self, document: &DocumentId) -> Vec<TransactionView> {
        self.blocks
            .iter()
            .skip(1)
            .flat_map(|block| {
                block
                    .transactions()
                    .iter()
                    .filter(|tx| &tx.document_id == document)
                    .map(move |tx| TransactionView {
                        transaction: tx.clone(),
                        block_index: block.index,
                        block_hash: block.hash,
                        block_timestamp: block.timestamp,
                    })
            })
            .collect()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            total_blocks: self.blocks.len(),
            difficulty: self.difficulty,
            pending_transactions: self.pending.len(),
            is_valid: self.is_valid(),
            latest_block: self.latest_block().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GENESIS_PREVIOUS_HASH;
    use crate::transaction::fixtures::registration;

    #[test]
    fn new_chain_has_only_genesis() {
        let chain = Blockchain::new().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.difficulty(), 2);
        assert_eq!(chain.latest_block().previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(chain.pending_transactions().is_empty());
        assert!(chain.is_valid());
    }

    #[test]
    fn oversized_difficulty_rejected() {
        assert!(matches!(
            Blockchain::with_difficulty(65),
            Err(LedgerError::InvalidDifficulty(65))
        ));
    }

    #[test]
    fn add_block_links_and_mines() {
        let mut chain = Blockchain::with_difficulty(2).unwrap();
        let genesis_hash = chain.latest_block().hash;
        let block = chain.add_block(registration("d1", "u1")).unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis_hash.to_hex());
        assert!(block.hash.to_hex().starts_with("00"));
        assert_eq!(chain.latest_block(), &block);
        assert!(chain.is_valid());
    }

    #[test]
    fn add_block_rejects_blank_document() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        let err = chain.add_block(registration("", "u1")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn staging_validates_and_does_not_mine() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        assert!(matches!(
            chain.stage_transaction(registration("d1", " ")),
            Err(LedgerError::Validation(_))
        ));
        chain.stage_transaction(registration("d1", "u1")).unwrap();
        assert_eq!(chain.pending_transactions().len(), 1);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn mining_nothing_is_none() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        assert_eq!(chain.mine_pending_transactions().unwrap(), None);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn mining_batches_all_pending() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.stage_transaction(registration("d1", "u1")).unwrap();
        chain.stage_transaction(registration("d2", "u2")).unwrap();
        let mined = chain.mine_pending_transactions().unwrap().unwrap();
        assert_eq!(mined.len(), 2);
        assert!(chain.pending_transactions().is_empty());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.latest_block().transactions(), mined.as_slice());
        assert!(chain.is_valid());
    }

    #[test]
    fn cancelled_mining_keeps_pending() {
        let mut chain = Blockchain::with_difficulty(64).unwrap();
        chain.stage_transaction(registration("d1", "u1")).unwrap();
        let cancel = AtomicBool::new(true);
        let err = chain.mine_pending_transactions_cancellable(&cancel).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { .. }));
        assert_eq!(chain.pending_transactions().len(), 1);
        assert_eq!(chain.len(), 1);

        let err = chain
            .add_block_cancellable(registration("d2", "u1"), &cancel)
            .unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled { .. }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn history_spans_single_and_batch_blocks() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        chain.stage_transaction(registration("d2", "u1")).unwrap();
        chain.stage_transaction(registration("d1", "u2")).unwrap();
        chain.mine_pending_transactions().unwrap();
        chain.stage_transaction(registration("d1", "u3")).unwrap();

        let history = chain.find_transactions_by_document_id(&DocumentId::new("d1"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].block_index, 1);
        assert_eq!(history[1].block_index, 2);
        assert_eq!(history[1].transaction.user_id.as_str(), "u2");
        assert_eq!(history[1].block_hash, chain.latest_block().hash);
        assert!(chain
            .find_transactions_by_document_id(&DocumentId::new("missing"))
            .is_empty());
    }

    #[test]
    fn block_lookup_is_bounds_checked() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        assert_eq!(chain.block(1).unwrap().index, 1);
        assert_eq!(chain.block(2), Err(LedgerError::BlockNotFound(2)));
        assert_eq!(chain.block(u64::MAX), Err(LedgerError::BlockNotFound(u64::MAX)));
    }

    #[test]
    fn stats_reflect_state() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        chain.stage_transaction(registration("d2", "u1")).unwrap();
        let stats = chain.stats();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.difficulty, 1);
        assert_eq!(stats.pending_transactions, 1);
        assert!(stats.is_valid);
        assert_eq!(&stats.latest_block, chain.latest_block());
    }

    #[test]
    fn tampering_flips_validity() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        chain.add_block(registration("d2", "u1")).unwrap();
        assert!(chain.validity().valid);

        let mut snapshot = chain.snapshot();
        if let BlockPayload::Single(tx) = &mut snapshot.chain[1].data {
            tx.document_hash = dtl_types::Digest::of(b"forged");
        }
        let tampered = Blockchain::from_snapshot(snapshot).unwrap();
        assert!(!tampered.is_valid());
        assert_eq!(tampered.validity().message, ValidityStatus::INVALID_MESSAGE);
        assert!(!tampered.stats().is_valid);
    }

    #[test]
    fn snapshot_restores_everything() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        chain.stage_transaction(registration("d2", "u1")).unwrap();
        let restored = Blockchain::from_snapshot(chain.snapshot()).unwrap();
        assert_eq!(restored.blocks(), chain.blocks());
        assert_eq!(restored.pending_transactions(), chain.pending_transactions());
        assert_eq!(restored.difficulty(), 1);
        assert!(restored.is_valid());
    }

    #[test]
    fn empty_snapshot_rejected() {
        let snapshot = ChainSnapshot {
            chain: Vec::new(),
            difficulty: 2,
            pending_transactions: Vec::new(),
        };
        assert!(matches!(
            Blockchain::from_snapshot(snapshot),
            Err(LedgerError::EmptyChain)
        ));
    }

    #[test]
    fn staged_registration_is_found_after_mining() {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        let content = b"quarterly report";
        let mut tx = registration("d1", "u1");
        tx.document_hash = dtl_types::Digest::of(content);
        chain.stage_transaction(tx).unwrap();

        let before = chain.len();
        chain.mine_pending_transactions().unwrap().unwrap();
        assert_eq!(chain.len(), before + 1);

        let history = chain.find_transactions_by_document_id(&DocumentId::new("d1"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].block_index, chain.latest_block().index);
        assert_eq!(history[0].transaction.document_hash, dtl_types::Digest::of(content));
    }

    fn tampered(edit: impl FnOnce(&mut Block)) -> bool {
        let mut chain = Blockchain::with_difficulty(1).unwrap();
        chain.add_block(registration("d1", "u1")).unwrap();
        chain.add_block(registration("d2", "u1")).unwrap();
        let mut snapshot = chain.snapshot();
        edit(&mut snapshot.chain[1]);
        Blockchain::from_snapshot(snapshot).unwrap().is_valid()
    }

    #[test]
    fn mutating_any_hashed_field_invalidates() {
        assert!(!tampered(|b| b.data = BlockPayload::Batch(Vec::new())));
        assert!(!tampered(|b| b.previous_hash.push('0')));
        assert!(!tampered(|b| b.nonce += 1));
        assert!(!tampered(|b| b.timestamp += 1));
        assert!(tampered(|_| {}));
    }

    #[test]
    fn raising_difficulty_invalidates_old_blocks() {
        let mut chain = Blockchain::with_difficulty(0).unwrap();
        for i in 0..5 {
            chain.add_block(registration(&format!("d{i}"), "u1")).unwrap();
        }
        assert!(chain.is_valid());
        let mut snapshot = chain.snapshot();
        snapshot.difficulty = 16;
        assert!(!Blockchain::from_snapshot(snapshot).unwrap().is_valid());
    }
}

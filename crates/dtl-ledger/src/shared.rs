use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use dtl_types::DocumentId;

use crate::block::Block;
use crate::chain::{Blockchain, ChainStats};
use crate::error::{LedgerError, LedgerResult};
use crate::snapshot::{ChainFile, ChainSnapshot};
use crate::transaction::{Transaction, TransactionView};
use crate::validation::{ValidationReport, ValidityStatus};

/// The one process-wide ledger handle.
///
/// Readers share the lock; staging, mining and appending take it
/// exclusively, so concurrent appends can never both link to the same
/// predecessor. When a [`ChainFile`] is attached, every mutation is written
/// through to it before the lock is released, and a mutation whose write
/// fails is not applied.
#[derive(Clone)]
pub struct SharedLedger {
    chain: Arc<RwLock<Blockchain>>,
    file: Option<Arc<ChainFile>>,
}

impl SharedLedger {
    pub fn new(chain: Blockchain) -> Self {
        Self {
            chain: Arc::new(RwLock::new(chain)),
            file: None,
        }
    }

    /// A ledger that saves itself to `file` after every mutation.
    pub fn persistent(chain: Blockchain, file: ChainFile) -> Self {
        Self {
            chain: Arc::new(RwLock::new(chain)),
            file: Some(Arc::new(file)),
        }
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Blockchain>> {
        self.chain.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Blockchain>> {
        self.chain.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn persist(&self, chain: &Blockchain) -> LedgerResult<()> {
        if let Some(file) = &self.file {
            file.save(chain).inspect_err(|e| {
                warn!(path = %file.path().display(), error = %e, "chain snapshot not saved");
            })?;
        }
        Ok(())
    }

    /// Apply `f` to a copy of the chain, save the copy, then publish it.
    ///
    /// An `Err` from either step leaves the in-memory chain unchanged.
    fn commit<R>(
        &self,
        chain: &mut Blockchain,
        f: impl FnOnce(&mut Blockchain) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let mut next = chain.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *chain = next;
        Ok(out)
    }

    pub fn stage_transaction(&self, transaction: Transaction) -> LedgerResult<()> {
        let mut chain = self.write()?;
        self.commit(&mut chain, |next| next.stage_transaction(transaction))
    }

    pub fn mine_pending_transactions(&self) -> LedgerResult<Option<Vec<Transaction>>> {
        self.mine_pending_transactions_cancellable(&AtomicBool::new(false))
    }

    pub fn mine_pending_transactions_cancellable(
        &self,
        cancel: &AtomicBool,
    ) -> LedgerResult<Option<Vec<Transaction>>> {
        let mut chain = self.write()?;
        if chain.pending_transactions().is_empty() {
            return Ok(None);
        }
        self.commit(&mut chain, |next| next.mine_pending_transactions_cancellable(cancel))
    }

    pub fn add_block(&self, transaction: Transaction) -> LedgerResult<Block> {
        self.add_block_cancellable(transaction, &AtomicBool::new(false))
    }

    pub fn add_block_cancellable(
        &self,
        transaction: Transaction,
        cancel: &AtomicBool,
    ) -> LedgerResult<Block> {
        let mut chain = self.write()?;
        self.commit(&mut chain, |next| next.add_block_cancellable(transaction, cancel))
    }

    pub fn is_valid(&self) -> LedgerResult<bool> {
        Ok(self.read()?.is_valid())
    }

    pub fn validity(&self) -> LedgerResult<ValidityStatus> {
        Ok(self.read()?.validity())
    }

    pub fn validation_report(&self) -> LedgerResult<ValidationReport> {
        Ok(self.read()?.validation_report())
    }

    pub fn find_transactions_by_document_id(
        &self,
        document: &DocumentId,
    ) -> LedgerResult<Vec<TransactionView>> {
        Ok(self.read()?.find_transactions_by_document_id(document))
    }

    pub fn stats(&self) -> LedgerResult<ChainStats> {
        Ok(self.read()?.stats())
    }

    pub fn snapshot(&self) -> LedgerResult<ChainSnapshot> {
        Ok(self.read()?.snapshot())
    }

    pub fn blocks(&self) -> LedgerResult<Vec<Block>> {
        Ok(self.read()?.blocks().to_vec())
    }

    pub fn block(&self, index: u64) -> LedgerResult<Block> {
        self.read()?.block(index).cloned()
    }

    pub fn latest_block(&self) -> LedgerResult<Block> {
        Ok(self.read()?.latest_block().clone())
    }

    pub fn pending_transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.read()?.pending_transactions().to_vec())
    }

    pub fn difficulty(&self) -> LedgerResult<usize> {
        Ok(self.read()?.difficulty())
    }
}

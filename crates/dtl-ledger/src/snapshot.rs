use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use dtl_store::JsonSnapshotFile;

use crate::block::Block;
use crate::chain::Blockchain;
use crate::config::{LedgerConfig, DEFAULT_DIFFICULTY};
use crate::error::LedgerResult;
use crate::transaction::Transaction;

/// Persisted form of a [`Blockchain`]: `{chain, difficulty, pendingTransactions}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub difficulty: usize,
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
}

impl Default for ChainSnapshot {
    fn default() -> Self {
        Self {
            chain: Vec::new(),
            difficulty: DEFAULT_DIFFICULTY,
            pending_transactions: Vec::new(),
        }
    }
}

/// A chain kept in one JSON file.
pub struct ChainFile {
    file: JsonSnapshotFile<ChainSnapshot>,
}

impl ChainFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonSnapshotFile::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    /// Load the stored chain, or create and save a fresh one from `config`.
    pub fn load_or_create(&self, config: &LedgerConfig) -> LedgerResult<Blockchain> {
        if self.file.exists() {
            let chain = Blockchain::from_snapshot(self.file.load()?)?;
            info!(path = %self.path().display(), blocks = chain.len(), "chain loaded");
            return Ok(chain);
        }
        config.validate()?;
        let chain = Blockchain::from_config(config)?;
        self.save(&chain)?;
        Ok(chain)
    }

    pub fn load(&self) -> LedgerResult<Blockchain> {
        Blockchain::from_snapshot(self.file.load()?)
    }

    pub fn save(&self, chain: &Blockchain) -> LedgerResult<()> {
        self.file.save(&chain.snapshot())?;
        Ok(())
    }
}

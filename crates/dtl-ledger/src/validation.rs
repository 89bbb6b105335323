use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::block::{Block, GENESIS_PREVIOUS_HASH};

/// Integrity walk over a chain.
///
/// Index 0 is trusted as an anchor: its hash, linkage and proof of work are
/// never checked by [`is_valid`](Self::is_valid). For every later block the
/// checks run in order: recomputed hash, link to the predecessor, proof of
/// work. The first failure decides.
pub struct ChainValidator;

impl ChainValidator {
    pub fn is_valid(blocks: &[Block], difficulty: usize) -> bool {
        for (pos, pair) in blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = pos + 1;
            if !current.is_hash_consistent() {
                warn!(index, "block hash does not match its contents");
                return false;
            }
            if current.previous_hash != previous.hash.to_hex() {
                warn!(index, "block is not linked to its predecessor");
                return false;
            }
            if !current.hash.meets_difficulty(difficulty) {
                warn!(index, difficulty, "block hash lacks required proof of work");
                return false;
            }
        }
        true
    }

    /// Full report of every violation, for diagnostics.
    pub fn validate(blocks: &[Block], difficulty: usize) -> ValidationReport {
        let mut violations = Vec::new();

        for (pos, block) in blocks.iter().enumerate() {
            let expected = pos as u64;
            if block.index != expected {
                violations.push(Violation {
                    index: expected,
                    kind: ViolationKind::IndexGap,
                    description: format!("expected index {expected}, got {}", block.index),
                });
            }
            if pos == 0 {
                continue;
            }
            if !block.is_hash_consistent() {
                violations.push(Violation {
                    index: expected,
                    kind: ViolationKind::HashMismatch,
                    description: "stored hash does not match recomputed hash".into(),
                });
            }
            let previous = &blocks[pos - 1];
            if block.previous_hash != previous.hash.to_hex() {
                violations.push(Violation {
                    index: expected,
                    kind: ViolationKind::BrokenLink,
                    description: format!(
                        "previous hash {} does not match block {}",
                        block.previous_hash,
                        pos - 1
                    ),
                });
            }
            if !block.hash.meets_difficulty(difficulty) {
                violations.push(Violation {
                    index: expected,
                    kind: ViolationKind::InsufficientWork,
                    description: format!(
                        "hash has {} leading zeros, difficulty is {difficulty}",
                        block.hash.leading_zero_nibbles()
                    ),
                });
            }
        }

        let genesis_consistent = blocks.first().is_some_and(|g| {
            g.index == 0 && g.previous_hash == GENESIS_PREVIOUS_HASH && g.is_hash_consistent()
        });

        ValidationReport {
            block_count: blocks.len() as u64,
            difficulty,
            genesis_consistent,
            violations,
        }
    }
}

/// Result of a full chain walk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub block_count: u64,
    pub difficulty: usize,
    /// Whether the genesis block matches its own contents. Informational
    /// only; genesis is never a violation.
    pub genesis_consistent: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Stricter than [`ChainValidator::is_valid`]: index gaps also count.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Index of the first block with a violation.
    pub fn first_violation(&self) -> Option<u64> {
        self.violations.first().map(|v| v.index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub index: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    IndexGap,
    HashMismatch,
    BrokenLink,
    InsufficientWork,
}

/// `{valid, message}` answer to "is the chain intact?".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityStatus {
    pub valid: bool,
    pub message: String,
}

impl ValidityStatus {
    pub const VALID_MESSAGE: &'static str = "chain is valid and intact";
    pub const INVALID_MESSAGE: &'static str = "chain has been tampered with";

    pub fn from_valid(valid: bool) -> Self {
        let message = if valid {
            Self::VALID_MESSAGE
        } else {
            Self::INVALID_MESSAGE
        };
        Self {
            valid,
            message: message.into(),
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Default proof-of-work difficulty: two leading hex zeros (~1/256 tries).
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Largest meaningful difficulty: every hex character of a SHA-256 digest.
pub const MAX_DIFFICULTY: usize = 64;

/// Ledger configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading hex `'0'` characters required of a mined block hash.
    pub difficulty: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: usize) -> Self {
        Self { difficulty }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidDifficulty(self.difficulty));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_difficulty_is_two() {
        assert_eq!(LedgerConfig::default().difficulty, 2);
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_difficulty_rejected() {
        assert_eq!(
            LedgerConfig::with_difficulty(65).validate(),
            Err(LedgerError::InvalidDifficulty(65))
        );
        assert!(LedgerConfig::with_difficulty(64).validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, LedgerConfig::default());
    }
}

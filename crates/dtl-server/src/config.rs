use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dtl_ledger::LedgerConfig;

use crate::error::{ServerError, ServerResult};

/// Server configuration, loadable from TOML. Missing keys take defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Root of keys, uploads, the document database and the chain file.
    pub data_dir: PathBuf,
    pub difficulty: usize,
    pub max_upload_bytes: usize,
    /// Upper bound on one mining request; `0` disables the limit.
    pub mining_timeout_secs: u64,
    /// Accept `encrypt = true` uploads, sealing them with AES-256-GCM under
    /// the master key at `at_rest_key_path()`.
    pub encryption: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            data_dir: PathBuf::from("data"),
            difficulty: dtl_ledger::config::DEFAULT_DIFFICULTY,
            max_upload_bytes: 10 * 1024 * 1024,
            mining_timeout_secs: 30,
            encryption: true,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))?;
        config.ledger().validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn ledger(&self) -> LedgerConfig {
        LedgerConfig::with_difficulty(self.difficulty)
    }

    pub fn mining_timeout(&self) -> Option<Duration> {
        (self.mining_timeout_secs > 0).then(|| Duration::from_secs(self.mining_timeout_secs))
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("database.json")
    }

    pub fn chain_path(&self) -> PathBuf {
        self.data_dir.join("blockchain.json")
    }

    pub fn at_rest_key_path(&self) -> PathBuf {
        self.data_dir.join("at-rest.key")
    }
}

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use dtl_crypto::FileKeyStore;
use dtl_ledger::{ChainFile, SharedLedger};
use dtl_store::{AesGcmCipher, FsContentStore};
use dtl_trust::{DocumentTrust, JsonDocumentRepository};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Build a [`DocumentTrust`] over the file-backed stores under
/// `config.data_dir`, creating the chain file and, with encryption on, the
/// at-rest master key on first use.
pub fn open_trust(config: &ServerConfig) -> ServerResult<DocumentTrust> {
    let chain_file = ChainFile::new(config.chain_path());
    let chain = chain_file.load_or_create(&config.ledger())?;
    if !chain.is_valid() {
        warn!(path = %config.chain_path().display(), "loaded chain fails validation");
    }
    let key_store = FileKeyStore::open(config.keys_dir())
        .map_err(|e| ServerError::Config(format!("key store: {e}")))?;
    let content = FsContentStore::open(config.uploads_dir())
        .map_err(|e| ServerError::Config(format!("upload store: {e}")))?;
    let trust = DocumentTrust::new(
        Arc::new(key_store),
        Arc::new(content),
        Arc::new(JsonDocumentRepository::new(config.database_path())),
        SharedLedger::persistent(chain, chain_file),
    );
    if !config.encryption {
        return Ok(trust);
    }
    let cipher = AesGcmCipher::load_or_create(&config.at_rest_key_path())
        .map_err(|e| ServerError::Config(format!("at-rest key: {e}")))?;
    Ok(trust.with_cipher(Arc::new(cipher)))
}

/// Document Trust Ledger HTTP server.
pub struct DtlServer {
    config: ServerConfig,
    trust: Arc<DocumentTrust>,
}

impl DtlServer {
    /// Open the file-backed stores under `config.data_dir`.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let trust = open_trust(&config)?;
        Ok(Self::with_trust(config, Arc::new(trust)))
    }

    pub fn with_trust(config: ServerConfig, trust: Arc<DocumentTrust>) -> Self {
        Self { config, trust }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let state = AppState::new(Arc::clone(&self.trust))
            .with_mining_timeout(self.config.mining_timeout());
        build_router(state, self.config.max_upload_bytes)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            data_dir = %self.config.data_dir.display(),
            difficulty = self.config.difficulty,
            "DTL server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use tracing::warn;

use dtl_ledger::LedgerError;
use dtl_trust::{DocumentTrust, TrustError};

use crate::auth::{Action, AuthProvider, Credentials, HeaderAuth, Identity};
use crate::error::{ServerError, ServerResult};

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub trust: Arc<DocumentTrust>,
    pub auth: Arc<dyn AuthProvider>,
    pub mining_timeout: Option<Duration>,
}

/// Raises the flag when the owning request future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(trust: Arc<DocumentTrust>) -> Self {
        Self {
            trust,
            auth: Arc::new(HeaderAuth),
            mining_timeout: None,
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_mining_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mining_timeout = timeout;
        self
    }

    pub async fn caller(&self, headers: &HeaderMap) -> ServerResult<Identity> {
        self.auth
            .authenticate(&Credentials::from_headers(headers))
            .await
    }

    pub async fn authorized(&self, headers: &HeaderMap, action: Action) -> ServerResult<Identity> {
        let identity = self.caller(headers).await?;
        if !self.auth.authorize(&identity, &action).await? {
            return Err(ServerError::Forbidden(format!("{} may not {action}", identity.user)));
        }
        Ok(identity)
    }

    /// Run `job` on the blocking pool.
    ///
    /// Trust operations do synchronous file I/O and may wait on locks held
    /// for a whole mining run, so handlers never call them on the executor.
    pub async fn blocking<T, F>(&self, job: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentTrust) -> ServerResult<T> + Send + 'static,
    {
        let trust = Arc::clone(&self.trust);
        tokio::task::spawn_blocking(move || job(&trust))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?
    }

    /// Run a mining-bearing job on the blocking pool.
    ///
    /// The job sees a cancellation flag that is raised when the timeout
    /// elapses or the request is dropped. After a timeout the job is still
    /// awaited: only a job that actually stopped on the flag becomes
    /// `MiningTimeout`, any other outcome is returned as is.
    pub async fn run_mining<T, F>(&self, job: F) -> ServerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentTrust, &AtomicBool) -> ServerResult<T> + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancel));
        let trust = Arc::clone(&self.trust);
        let flag = Arc::clone(&cancel);
        let task = tokio::task::spawn_blocking(move || job(&trust, &flag));

        let Some(limit) = self.mining_timeout else {
            return task.await.map_err(|e| ServerError::Internal(e.to_string()))?;
        };
        let mut task = task;
        match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined.map_err(|e| ServerError::Internal(e.to_string()))?,
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                // The job may have committed just before the flag was raised.
                match task.await.map_err(|e| ServerError::Internal(e.to_string()))? {
                    Err(ServerError::Ledger(LedgerError::MiningCancelled { .. }))
                    | Err(ServerError::Trust(TrustError::Ledger(LedgerError::MiningCancelled {
                        ..
                    }))) => {
                        warn!(timeout_ms = limit.as_millis() as u64, "mining timed out");
                        Err(ServerError::MiningTimeout)
                    }
                    finished => finished,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn state(timeout_ms: u64) -> AppState {
        let trust = Arc::new(DocumentTrust::in_memory(0).unwrap());
        AppState::new(trust).with_mining_timeout(Some(Duration::from_millis(timeout_ms)))
    }

    #[tokio::test]
    async fn work_finished_after_the_deadline_is_returned() {
        let out = state(10)
            .run_mining(|_, _| {
                thread::sleep(Duration::from_millis(100));
                Ok(7u64)
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancelled_work_is_a_timeout() {
        let err = state(10)
            .run_mining(|_, cancel: &AtomicBool| -> ServerResult<()> {
                while !cancel.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(LedgerError::MiningCancelled { nonce: 0 }.into())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::MiningTimeout));
    }

    #[tokio::test]
    async fn block_committed_at_the_deadline_is_reported() {
        let state = state(10);
        let key = dtl_crypto::SigningKey::generate().unwrap();
        let transaction = dtl_ledger::Transaction::document_registration(
            dtl_types::DocumentId::new("d1"),
            "a.txt",
            dtl_types::Digest::of(b"a"),
            dtl_types::UserId::new("alice"),
            key.sign(b"a").unwrap(),
        );
        let block = state
            .run_mining(move |trust, _| {
                thread::sleep(Duration::from_millis(50));
                Ok(trust.ledger().add_block(transaction)?)
            })
            .await
            .unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(state.trust.ledger().stats().unwrap().total_blocks, 2);
    }

    #[tokio::test]
    async fn blocking_jobs_see_the_shared_trust() {
        let state = state(10);
        let total = state
            .blocking(|trust| Ok(trust.ledger().stats()?.total_blocks))
            .await
            .unwrap();
        assert_eq!(total, 1);
        let err = state
            .blocking(|_| -> ServerResult<()> { Err(ServerError::BadRequest("no".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[tokio::test]
    async fn without_a_limit_the_job_runs_to_completion() {
        let trust = Arc::new(DocumentTrust::in_memory(0).unwrap());
        let out = AppState::new(trust)
            .run_mining(|_, cancel| Ok(cancel.load(Ordering::Relaxed)))
            .await
            .unwrap();
        assert!(!out);
    }
}

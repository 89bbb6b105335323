use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use dtl_crypto::CryptoError;
use dtl_ledger::LedgerError;
use dtl_store::StoreError;
use dtl_trust::TrustError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("mining did not finish in time")]
    MiningTimeout,

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::BlockNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::MiningCancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MiningTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Ledger(e) => ledger_status(e),
            Self::Trust(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Trust(e) => match e {
                TrustError::Forbidden { .. } => StatusCode::FORBIDDEN,
                TrustError::NotSigned(_)
                | TrustError::AlreadyRegistered { .. }
                | TrustError::EncryptionUnavailable
                | TrustError::InvalidInput(_)
                | TrustError::Crypto(CryptoError::InvalidUserId(_))
                | TrustError::Store(StoreError::InvalidName(_)) => StatusCode::BAD_REQUEST,
                TrustError::Ledger(e) => ledger_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use dtl_types::{DocumentId, UserId};

    use super::*;

    #[test]
    fn status_mapping() {
        let doc = DocumentId::new("d1");
        assert_eq!(
            ServerError::from(TrustError::DocumentNotFound(doc.clone())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(TrustError::Forbidden {
                document: doc.clone(),
                user: UserId::new("u2"),
            })
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::from(TrustError::NotSigned(doc)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(TrustError::Crypto(CryptoError::KeyNotFound(UserId::new("u1")))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(LedgerError::BlockNotFound(7)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Unauthenticated("missing x-user-id".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::from(LedgerError::LockPoisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let response = ServerError::Internal("/secret/path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use dtl_crypto::{Certificate, CertificateAuthority, CertificateStatus, SubjectInfo};
use dtl_ledger::{Block, ChainSnapshot, ChainStats, Transaction, TransactionView, ValidityStatus};
use dtl_trust::{Document, Registration, SignReceipt, TrustError, VerificationReport};
use dtl_types::DocumentId;

use crate::auth::Action;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler() -> Json<Value> {
    Json(json!({
        "name": "dtl-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---- Users ----

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnrollRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
}

pub async fn enroll_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EnrollRequest>,
) -> ServerResult<(StatusCode, Json<Certificate>)> {
    let identity = state.authorized(&headers, Action::Enroll).await?;
    let subject = SubjectInfo {
        username: request.username,
        email: request.email,
        organization: request.organization,
    };
    let certificate = state
        .blocking(move |trust| Ok(trust.enroll(&identity.user, &subject)?))
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

pub async fn my_certificate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<CertificateStatus>> {
    let identity = state.caller(&headers).await?;
    let status = state
        .blocking(move |trust| Ok(trust.certificate_status(&identity.user)?))
        .await?;
    Ok(Json(status))
}

// ---- Documents ----

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
    #[serde(default)]
    pub encrypt: bool,
}

pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<Document>)> {
    let identity = state.authorized(&headers, Action::Upload).await?;
    if body.is_empty() {
        return Err(ServerError::BadRequest("no document content".into()));
    }
    let document = state
        .blocking(move |trust| {
            Ok(trust.upload(&identity.user, &params.name, &body, params.encrypt)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_documents_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<Document>>> {
    let identity = state.caller(&headers).await?;
    let documents = state
        .blocking(move |trust| Ok(trust.documents_for(&identity.user)?))
        .await?;
    Ok(Json(documents))
}

pub async fn get_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Document>> {
    let id = DocumentId::new(id);
    let identity = state
        .authorized(&headers, Action::ReadDocument { document: id.clone() })
        .await?;
    let document = state
        .blocking(move |trust| {
            let document = trust.document(&id)?;
            if !document.is_owned_by(&identity.user) {
                return Err(TrustError::Forbidden {
                    document: id,
                    user: identity.user,
                }
                .into());
            }
            Ok(document)
        })
        .await?;
    Ok(Json(document))
}

pub async fn download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let id = DocumentId::new(id);
    let identity = state
        .authorized(&headers, Action::ReadDocument { document: id.clone() })
        .await?;
    let (document, bytes) = state
        .blocking(move |trust| Ok(trust.download(&identity.user, &id)?))
        .await?;
    let disposition = format!("attachment; filename=\"{}\"", document.original_name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub async fn sign_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<SignReceipt>> {
    let id = DocumentId::new(id);
    let identity = state
        .authorized(&headers, Action::Sign { document: id.clone() })
        .await?;
    let receipt = state
        .blocking(move |trust| Ok(trust.sign(&identity.user, &id)?))
        .await?;
    Ok(Json(receipt))
}

pub async fn verify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<VerificationReport>> {
    state.caller(&headers).await?;
    let report = state
        .blocking(move |trust| Ok(trust.verify(&DocumentId::new(id))?))
        .await?;
    Ok(Json(report))
}

pub async fn signer_certificate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<CertificateStatus>> {
    state.caller(&headers).await?;
    let certificate = state
        .blocking(move |trust| Ok(trust.signer_certificate(&DocumentId::new(id))?))
        .await?;
    let valid = CertificateAuthority::verify(&certificate);
    Ok(Json(CertificateStatus { certificate, valid }))
}

// ---- Chain ----

pub async fn chain_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<ChainSnapshot>> {
    state.caller(&headers).await?;
    let snapshot = state
        .blocking(|trust| Ok(trust.ledger().snapshot()?))
        .await?;
    Ok(Json(snapshot))
}

pub async fn block_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(index): Path<u64>,
) -> ServerResult<Json<Block>> {
    state.caller(&headers).await?;
    let block = state
        .blocking(move |trust| Ok(trust.ledger().block(index)?))
        .await?;
    Ok(Json(block))
}

pub async fn validate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<ValidityStatus>> {
    state.caller(&headers).await?;
    let validity = state
        .blocking(|trust| Ok(trust.ledger().validity()?))
        .await?;
    Ok(Json(validity))
}

pub async fn stats_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<ChainStats>> {
    state.caller(&headers).await?;
    let stats = state.blocking(|trust| Ok(trust.ledger().stats()?)).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub document_id: String,
}

pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> ServerResult<(StatusCode, Json<Registration>)> {
    if request.document_id.trim().is_empty() {
        return Err(ServerError::BadRequest("documentId is required".into()));
    }
    let id = DocumentId::new(request.document_id);
    let identity = state
        .authorized(&headers, Action::Register { document: id.clone() })
        .await?;
    let registration = state
        .run_mining(move |trust, cancel| {
            Ok(trust.register_cancellable(&identity.user, &id, cancel)?)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineResponse {
    pub mined: usize,
    pub transactions: Vec<Transaction>,
}

pub async fn mine_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<MineResponse>> {
    state.authorized(&headers, Action::Mine).await?;
    let mined = state
        .run_mining(|trust, cancel| {
            Ok(trust
                .ledger()
                .mine_pending_transactions_cancellable(cancel)?)
        })
        .await?;
    match mined {
        Some(transactions) => Ok(Json(MineResponse {
            mined: transactions.len(),
            transactions,
        })),
        None => Err(ServerError::BadRequest("no pending transactions to mine".into())),
    }
}

pub async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ServerResult<Json<Vec<TransactionView>>> {
    state.caller(&headers).await?;
    let document = DocumentId::new(id.as_str());
    let history = state
        .blocking(move |trust| Ok(trust.history(&document)?))
        .await?;
    if history.is_empty() {
        return Err(ServerError::NotFound(format!("no ledger records for document {id}")));
    }
    Ok(Json(history))
}

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all DTL endpoints.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/users/enroll", post(handler::enroll_handler))
        .route("/v1/users/me/certificate", get(handler::my_certificate_handler))
        .route(
            "/v1/documents",
            get(handler::list_documents_handler).post(handler::upload_handler),
        )
        .route("/v1/documents/:id", get(handler::get_document_handler))
        .route("/v1/documents/:id/content", get(handler::download_handler))
        .route("/v1/documents/:id/sign", post(handler::sign_handler))
        .route("/v1/documents/:id/verify", get(handler::verify_handler))
        .route(
            "/v1/documents/:id/certificate",
            get(handler::signer_certificate_handler),
        )
        .route("/v1/chain", get(handler::chain_handler))
        .route("/v1/chain/blocks/:index", get(handler::block_handler))
        .route("/v1/chain/validate", get(handler::validate_handler))
        .route("/v1/chain/stats", get(handler::stats_handler))
        .route("/v1/chain/register", post(handler::register_handler))
        .route("/v1/chain/mine", post(handler::mine_handler))
        .route("/v1/chain/documents/:id", get(handler::history_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

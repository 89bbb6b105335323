//! HTTP server for the Document Trust Ledger.
//!
//! Exposes document upload, signing, verification and ledger registration,
//! plus the read surface of the chain, over a JSON API. The caller identity
//! comes from the `x-user-id` header and is trusted as given.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{Action, AuthProvider, Credentials, HeaderAuth, Identity, USER_ID_HEADER};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{open_trust, DtlServer};
pub use state::AppState;

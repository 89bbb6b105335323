use async_trait::async_trait;
use axum::http::HeaderMap;

use dtl_types::{DocumentId, UserId};

use crate::error::{ServerError, ServerResult};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user: UserId,
}

impl Identity {
    pub fn user(id: impl Into<UserId>) -> Self {
        Self { user: id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    UserId(String),
    Anonymous,
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
            Some(id) if !id.trim().is_empty() => Self::UserId(id.trim().to_owned()),
            _ => Self::Anonymous,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Action {
    Enroll,
    Upload,
    ReadDocument { document: DocumentId },
    Sign { document: DocumentId },
    Register { document: DocumentId },
    Mine,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enroll => write!(f, "enroll"),
            Self::Upload => write!(f, "upload"),
            Self::ReadDocument { document } => write!(f, "read:{document}"),
            Self::Sign { document } => write!(f, "sign:{document}"),
            Self::Register { document } => write!(f, "register:{document}"),
            Self::Mine => write!(f, "mine"),
        }
    }
}

/// Establishes who the caller is. The trust core accepts the result as-is.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
    async fn authorize(&self, identity: &Identity, action: &Action) -> ServerResult<bool>;
}

/// Trusts the `x-user-id` header and allows every action.
///
/// Document ownership is still enforced by the trust core.
pub struct HeaderAuth;

#[async_trait]
impl AuthProvider for HeaderAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::UserId(id) => Ok(Identity::user(id.as_str())),
            Credentials::Anonymous => Err(ServerError::Unauthenticated(format!(
                "missing {USER_ID_HEADER} header"
            ))),
        }
    }

    async fn authorize(&self, _identity: &Identity, _action: &Action) -> ServerResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn credentials_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(Credentials::from_headers(&headers), Credentials::Anonymous);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(
            Credentials::from_headers(&headers),
            Credentials::UserId("alice".into())
        );
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Mine.to_string(), "mine");
        assert_eq!(
            Action::Sign {
                document: DocumentId::new("d1")
            }
            .to_string(),
            "sign:d1"
        );
    }

    #[tokio::test]
    async fn header_auth() {
        let auth = HeaderAuth;
        let id = auth
            .authenticate(&Credentials::UserId("alice".into()))
            .await
            .unwrap();
        assert_eq!(id.user, UserId::new("alice"));
        assert!(auth.authorize(&id, &Action::Upload).await.unwrap());

        let err = auth.authenticate(&Credentials::Anonymous).await.unwrap_err();
        assert!(matches!(err, ServerError::Unauthenticated(_)));
    }
}

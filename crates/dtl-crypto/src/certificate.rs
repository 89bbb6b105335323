use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use dtl_types::{Digest, UserId};

use crate::error::CryptoResult;
use crate::hasher::digest_json;
use crate::signer::VerifyingKey;

/// Certificate format version.
pub const CERTIFICATE_VERSION: &str = "1.0";

/// Default validity window of an issued certificate.
pub const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Optional subject details supplied at issuance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub username: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
}

impl SubjectInfo {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: Some(email.into()),
            organization: None,
        }
    }
}

/// The certified subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectName {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub organization: String,
}

/// The fixed local issuing identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInfo {
    pub common_name: String,
    pub organization: String,
    pub country: String,
}

impl Default for IssuerInfo {
    fn default() -> Self {
        Self {
            common_name: "Document Trust CA".into(),
            organization: "Document Trust Ledger".into(),
            country: "ES".into(),
        }
    }
}

/// Inclusive validity window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// `not_before <= now <= not_after`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

/// Self-signed certificate binding a user to an Ed25519 public key.
///
/// Invariant: `signature == digest(json({subject, validity, publicKey}))`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub version: String,
    pub serial_number: String,
    pub subject: SubjectName,
    pub issuer: IssuerInfo,
    pub validity: Validity,
    /// Hex-encoded public key.
    pub public_key: String,
    pub signature: Digest,
}

impl Certificate {
    /// Recompute the self-signature from the current field values.
    pub fn expected_signature(&self) -> CryptoResult<Digest> {
        self_signature(&self.subject, &self.validity, &self.public_key)
    }

    /// The certified public key, if it decodes.
    pub fn verifying_key(&self) -> Option<VerifyingKey> {
        VerifyingKey::from_hex(&self.public_key).ok()
    }
}

/// A loaded certificate paired with its verification outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatus {
    pub certificate: Certificate,
    pub valid: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedBody<'a> {
    subject: &'a SubjectName,
    validity: &'a Validity,
    public_key: &'a str,
}

fn self_signature(subject: &SubjectName, validity: &Validity, public_key: &str) -> CryptoResult<Digest> {
    digest_json(&SignedBody {
        subject,
        validity,
        public_key,
    })
}

/// Local issuing authority for self-signed certificates.
#[derive(Clone, Debug)]
pub struct CertificateAuthority {
    issuer: IssuerInfo,
    validity: Duration,
}

impl Default for CertificateAuthority {
    fn default() -> Self {
        Self::new(IssuerInfo::default())
    }
}

impl CertificateAuthority {
    pub fn new(issuer: IssuerInfo) -> Self {
        Self {
            issuer,
            validity: Duration::days(DEFAULT_VALIDITY_DAYS),
        }
    }

    /// Override the validity length of issued certificates.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn issuer(&self) -> &IssuerInfo {
        &self.issuer
    }

    /// Build and self-sign a certificate valid over `[now, now + validity]`.
    pub fn issue(
        &self,
        user: &UserId,
        info: &SubjectInfo,
        public_key: &VerifyingKey,
        now: DateTime<Utc>,
    ) -> CryptoResult<Certificate> {
        let subject = SubjectName {
            user_id: user.clone(),
            username: info
                .username
                .clone()
                .unwrap_or_else(|| user.as_str().to_owned()),
            email: info.email.clone().unwrap_or_default(),
            organization: info
                .organization
                .clone()
                .unwrap_or_else(|| self.issuer.organization.clone()),
        };
        let validity = Validity {
            not_before: now,
            not_after: now + self.validity,
        };
        let public_key = public_key.to_hex();
        let signature = self_signature(&subject, &validity, &public_key)?;

        let mut serial = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut serial);

        Ok(Certificate {
            version: CERTIFICATE_VERSION.into(),
            serial_number: hex::encode(serial),
            subject,
            issuer: self.issuer.clone(),
            validity,
            public_key,
            signature,
        })
    }

    /// Check the self-signature and the time window at `now`.
    ///
    /// Invalidity is an expected outcome and is reported as `false`.
    pub fn verify_at(certificate: &Certificate, now: DateTime<Utc>) -> bool {
        if !certificate.validity.contains(now) {
            tracing::debug!(
                user = %certificate.subject.user_id,
                "certificate outside its validity window"
            );
            return false;
        }
        match certificate.expected_signature() {
            Ok(expected) if expected == certificate.signature => true,
            _ => {
                tracing::debug!(user = %certificate.subject.user_id, "certificate signature mismatch");
                false
            }
        }
    }

    /// Check the certificate against the current wall clock.
    pub fn verify(certificate: &Certificate) -> bool {
        Self::verify_at(certificate, Utc::now())
    }
}

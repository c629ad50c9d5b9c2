//! The subset of the [FIDO Metadata Service v3] BLOB that attestation trust evaluation needs.
//!
//! [FIDO Metadata Service v3]: https://fidoalliance.org/specs/mds/fido-metadata-service-v3.0-ps-20210518.html

use chrono::{DateTime, NaiveDate, Utc};
use passkey_rp_types::{authenticator::Aaguid, encoding};
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use super::MetadataError;
use crate::{cert, jws, Error};

/// The decoded payload of the metadata BLOB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayload {
    /// Legal terms of use of the BLOB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_header: Option<String>,
    /// Serial number of this BLOB, increasing with each publication.
    pub no: u32,
    /// Date by which a newer BLOB will be published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update: Option<NaiveDate>,
    /// One entry per authenticator model.
    pub entries: Vec<MetadataBlobPayloadEntry>,
}

/// Metadata about one authenticator model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBlobPayloadEntry {
    /// The model's AAGUID. Absent for U2F and UAF authenticators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<Aaguid>,
    /// The metadata statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_statement: Option<MetadataStatement>,
    /// Certification and compromise reports, oldest first.
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    /// When `status_reports` last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<NaiveDate>,
}

/// Describes an authenticator model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    /// Human readable model name.
    #[serde(default)]
    pub description: String,
    /// The AAGUID, repeated from the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<Aaguid>,
    /// Attestation types the model supports, e.g. `basic_full`.
    #[serde(default)]
    pub attestation_types: Vec<String>,
    /// Base64 (not base64url) DER certificates that attestation chains must lead to.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
}

/// One entry of an authenticator's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// The status.
    pub status: AuthenticatorStatus,
    /// Since when the status applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
}

/// Certification or compromise status of an authenticator model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticatorStatus {
    /// Not certified by the FIDO Alliance.
    NotFidoCertified,
    /// Certified, superseded by the levelled statuses.
    FidoCertified,
    /// Malware can bypass user verification.
    UserVerificationBypass,
    /// An attestation key is known to be compromised.
    AttestationKeyCompromise,
    /// Credential keys can be extracted or forged remotely.
    UserKeyRemoteCompromise,
    /// Credential keys can be extracted with physical access.
    UserKeyPhysicalCompromise,
    /// A firmware update is available.
    UpdateAvailable,
    /// The FIDO Alliance revoked the model.
    Revoked,
    /// The vendor submitted a self-certification checklist.
    SelfAssertionSubmitted,
    /// Certified at level 1.
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    #[strum(serialize = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    /// Certified at level 1+.
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    #[strum(serialize = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    /// Certified at level 2.
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    #[strum(serialize = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    /// Certified at level 2+.
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    #[strum(serialize = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    /// Certified at level 3.
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    #[strum(serialize = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    /// Certified at level 3+.
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    #[strum(serialize = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    /// A status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl AuthenticatorStatus {
    /// Statuses for which new registrations must be refused.
    pub fn is_compromised(self) -> bool {
        matches!(
            self,
            Self::UserVerificationBypass
                | Self::AttestationKeyCompromise
                | Self::UserKeyRemoteCompromise
                | Self::UserKeyPhysicalCompromise
                | Self::Revoked
        )
    }
}

impl MetadataBlobPayloadEntry {
    /// The current status, i.e. the most recent report.
    pub fn latest_status(&self) -> Option<AuthenticatorStatus> {
        self.status_reports
            .iter()
            .enumerate()
            .max_by_key(|(index, report)| (report.effective_date, *index))
            .map(|(_, report)| report.status)
    }

    /// Decode the attestation root certificates of the statement.
    pub fn attestation_roots(&self) -> Result<Vec<Certificate>, Error> {
        let Some(statement) = &self.metadata_statement else {
            return Ok(Vec::new());
        };
        statement
            .attestation_root_certificates
            .iter()
            .map(|encoded| {
                let der = encoding::try_from_base64(encoded).ok_or_else(|| {
                    Error::untrusted("metadata root certificate is not valid base64")
                })?;
                cert::parse(&der)
            })
            .collect()
    }
}

impl MetadataBlobPayload {
    /// Decode a metadata BLOB, a compact JWS whose payload is the JSON [`MetadataBlobPayload`].
    ///
    /// With a `trust_anchor` the JWS signature and its certificate chain are verified. Without one
    /// the payload is decoded as is, which is only appropriate when the transport is trusted.
    pub fn from_jws(
        token: &str,
        trust_anchor: Option<&Certificate>,
        now: DateTime<Utc>,
    ) -> Result<Self, MetadataError> {
        let payload = match trust_anchor {
            Some(root) => {
                let signed = jws::verify(token)
                    .map_err(|e| MetadataError::Untrusted(e.detail().to_owned()))?;
                cert::verify_chain(&signed.chain, std::slice::from_ref(root), now)
                    .map_err(|e| MetadataError::Untrusted(e.detail().to_owned()))?;
                signed.payload
            }
            None => {
                log::warn!("decoding metadata BLOB without verifying its signature");
                token
                    .trim()
                    .split('.')
                    .nth(1)
                    .and_then(encoding::try_from_base64url)
                    .ok_or_else(|| MetadataError::InvalidBlob("not a compact JWS".into()))?
            }
        };
        serde_json::from_slice(&payload).map_err(|e| MetadataError::InvalidBlob(e.to_string()))
    }
}

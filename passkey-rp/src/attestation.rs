//! Verification of attestation statements.
//!
//! Each supported statement format is a variant of [`AttestationFormat`]. [`verify`] checks that
//! the statement signs the authenticator data and client data hash, and that its certificates
//! satisfy the format's structural rules. Whether the certificates lead to a trusted root is
//! decided afterwards by [`evaluate_trust`], using authenticator metadata.

use std::time::Duration;

use chrono::{DateTime, Utc};
use coset::iana::{self, EnumI64};
use passkey_rp_types::authenticator::{
    Aaguid, AttestationStatement, AttestedCredentialData, AuthenticatorData,
};
use serde::{Deserialize, Serialize};

use crate::{
    cert,
    config::AttestationPolicy,
    metadata::{MetadataLookup, MetadataStatus},
    Error, ErrorKind,
};

mod android_safetynet;
mod apple;
mod fido_u2f;
mod none;
mod packed;
mod tpm;


/// The attestation statement formats this crate can verify.
///
/// <https://www.iana.org/assignments/webauthn/webauthn.xhtml>
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
)]
pub enum AttestationFormat {
    /// No attestation.
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    None,
    /// The WebAuthn optimized format, with a certificate chain or self attestation.
    #[serde(rename = "packed")]
    #[strum(serialize = "packed")]
    Packed,
    /// Legacy FIDO U2F security keys.
    #[serde(rename = "fido-u2f")]
    #[strum(serialize = "fido-u2f")]
    FidoU2f,
    /// Android SafetyNet attestation API responses.
    #[serde(rename = "android-safetynet")]
    #[strum(serialize = "android-safetynet")]
    AndroidSafetynet,
    /// Trusted Platform Module attestation.
    #[serde(rename = "tpm")]
    #[strum(serialize = "tpm")]
    Tpm,
    /// Apple anonymous attestation.
    #[serde(rename = "apple")]
    #[strum(serialize = "apple")]
    Apple,
}

/// The kind of trust an attestation conveys.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation-types>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    /// No attestation was provided.
    None,
    /// The statement was signed by the credential key itself.
    SelfAttestation,
    /// Signed by a batch attestation key.
    Basic,
    /// Signed by a key certified by an attestation CA, as done by TPMs.
    AttCa,
    /// Signed by a per-credential certificate from an anonymization CA.
    AnonCa,
}

impl AttestationType {
    /// Whether the attestation carries a certificate chain that can be anchored.
    pub fn has_trust_path(self) -> bool {
        matches!(self, Self::Basic | Self::AttCa | Self::AnonCa)
    }
}

/// A statement which passed its format's checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    /// The statement format.
    pub format: AttestationFormat,
    /// What the statement attests.
    pub attestation_type: AttestationType,
    /// The DER certificate chain, leaf first. Empty without a trust path.
    pub trust_path: Vec<Vec<u8>>,
}

/// Settings that influence format verification.
#[derive(Debug, Clone, Copy)]
pub struct VerificationOptions {
    /// The time certificates and timestamps are checked against.
    pub now: DateTime<Utc>,
    /// How far timestamps inside statements may drift from `now`.
    pub timestamp_drift_tolerance: Duration,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            now: Utc::now(),
            timestamp_drift_tolerance: Duration::from_secs(5 * 60),
        }
    }
}

/// Everything a format verifier looks at.
pub(crate) struct Statement<'a> {
    pub stmt: &'a AttestationStatement,
    pub auth_data_raw: &'a [u8],
    pub auth_data: AuthenticatorData,
    pub client_data_hash: &'a [u8; 32],
    pub options: &'a VerificationOptions,
}

impl Statement<'_> {
    /// `authenticatorData || clientDataHash`
    pub fn signed_data(&self) -> Vec<u8> {
        [self.auth_data_raw, self.client_data_hash.as_slice()].concat()
    }

    pub fn credential(&self) -> Result<&AttestedCredentialData, Error> {
        self.auth_data
            .attested_credential_data
            .as_ref()
            .ok_or_else(|| Error::malformed_attestation("missing attested credential data"))
    }

    pub fn bytes(&self, key: &str) -> Result<&[u8], Error> {
        self.stmt
            .bytes(key)
            .ok_or_else(|| Error::malformed_attestation(format!("missing `{key}`")))
    }

    pub fn text(&self, key: &str) -> Result<&str, Error> {
        self.stmt
            .text(key)
            .ok_or_else(|| Error::malformed_attestation(format!("missing `{key}`")))
    }

    pub fn alg(&self) -> Result<iana::Algorithm, Error> {
        let alg = self
            .stmt
            .int("alg")
            .ok_or_else(|| Error::malformed_attestation("missing `alg`"))?;
        iana::Algorithm::from_i64(alg)
            .ok_or_else(|| Error::signature(format!("unsupported algorithm: {alg}")))
    }

    /// The mandatory `x5c` chain.
    pub fn x5c(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.stmt
            .x5c()
            .ok_or_else(|| Error::malformed_attestation("missing `x5c`"))?
            .map_err(Error::from)
    }
}

/// Verify an attestation statement of the given format.
///
/// `auth_data` is the raw authenticator data from the attestation object, which must contain
/// attested credential data.
pub fn verify(
    format: AttestationFormat,
    att_stmt: &AttestationStatement,
    auth_data: &[u8],
    client_data_hash: &[u8; 32],
    options: &VerificationOptions,
) -> Result<VerifiedAttestation, Error> {
    let statement = Statement {
        stmt: att_stmt,
        auth_data_raw: auth_data,
        auth_data: AuthenticatorData::from_slice(auth_data)?,
        client_data_hash,
        options,
    };
    statement.credential()?;

    let (attestation_type, trust_path) = match format {
        AttestationFormat::None => none::verify(&statement)?,
        AttestationFormat::Packed => packed::verify(&statement)?,
        AttestationFormat::FidoU2f => fido_u2f::verify(&statement)?,
        AttestationFormat::AndroidSafetynet => android_safetynet::verify(&statement)?,
        AttestationFormat::Tpm => tpm::verify(&statement)?,
        AttestationFormat::Apple => apple::verify(&statement)?,
    };
    log::debug!("verified {format} attestation of type {attestation_type:?}");

    Ok(VerifiedAttestation {
        format,
        attestation_type,
        trust_path,
    })
}

/// Decide whether a verified attestation is trusted, using the authenticator's metadata.
///
/// Attestations without a trust path are always accepted. Otherwise the chain must lead to one of
/// the metadata's attestation roots and the authenticator must not be reported as compromised.
/// Missing metadata is only an error when the policy requires it.
pub fn evaluate_trust(
    attestation: &VerifiedAttestation,
    aaguid: &Aaguid,
    metadata: MetadataLookup,
    policy: &AttestationPolicy,
    now: DateTime<Utc>,
) -> Result<MetadataStatus, Error> {
    if !attestation.attestation_type.has_trust_path() || attestation.trust_path.is_empty() {
        return Ok(MetadataStatus::NotApplicable);
    }

    let statement = match metadata {
        MetadataLookup::Found(entry) => entry,
        MetadataLookup::Unavailable if policy.require_metadata => {
            return Err(Error::new(
                ErrorKind::MetadataUnavailable,
                format!("no metadata for authenticator {aaguid}"),
            ))
        }
        MetadataLookup::Unavailable => {
            log::debug!("no metadata for authenticator {aaguid}, attestation is unverified");
            return Ok(MetadataStatus::Unavailable);
        }
    };

    if let Some(status) = statement.latest_status().filter(|s| s.is_compromised()) {
        return Err(Error::untrusted(format!(
            "authenticator {aaguid} is reported as {status}"
        )));
    }

    let chain = cert::parse_chain(&attestation.trust_path)?;
    let roots = statement.attestation_roots()?;
    cert::verify_chain(&chain, &roots, now)?;
    Ok(MetadataStatus::Trusted)
}

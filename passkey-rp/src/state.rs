//! Server side state of a ceremony between its begin and finish calls.
//!
//! The states are serializable so they can be kept in a shared session store. They are consumed
//! by value when the ceremony finishes.

use chrono::{DateTime, Utc};
use coset::iana;
use passkey_rp_types::{
    webauthn::{PublicKeyCredentialDescriptor, UserVerificationRequirement},
    Bytes,
};
use serde::{Deserialize, Serialize};

use crate::{config::algorithm_list, credential_store::RelyingPartyUser, Error, ErrorKind};

/// What [`RelyingParty::finish_registration`](crate::RelyingParty::finish_registration) checks
/// the response against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationState {
    /// The challenge sent to the client.
    pub challenge: Bytes,
    /// The user the credential is created for.
    pub user: RelyingPartyUser,
    /// Whether the UV flag is required.
    pub user_verification: UserVerificationRequirement,
    /// The algorithms offered in `pubKeyCredParams`.
    #[serde(with = "algorithm_list")]
    pub algorithms: Vec<iana::Algorithm>,
    /// Whether the device public key extension was requested.
    pub device_public_key: bool,
    /// When the options stop being valid.
    pub expires_at: DateTime<Utc>,
}

/// What [`RelyingParty::finish_assertion`](crate::RelyingParty::finish_assertion) checks the
/// response against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionState {
    /// The challenge sent to the client.
    pub challenge: Bytes,
    /// The credentials the client was allowed to use. Empty for discoverable credentials.
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// Whether the UV flag is required.
    pub user_verification: UserVerificationRequirement,
    /// When the options stop being valid.
    pub expires_at: DateTime<Utc>,
}

/// Ceremony state with an expiry.
pub trait Expiring {
    /// When the state stops being valid.
    fn expires_at(&self) -> DateTime<Utc>;

    /// Whether the state expired at `now`.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Fail with [`ErrorKind::OptionsExpired`] once expired.
    fn check_expiry(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.is_expired(now) {
            Err(Error::new(
                ErrorKind::OptionsExpired,
                format!("options expired at {}", self.expires_at()),
            ))
        } else {
            Ok(())
        }
    }
}

impl Expiring for RegistrationState {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for AssertionState {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl AssertionState {
    /// Whether the credential may answer this assertion.
    pub fn allows(&self, credential_id: &[u8]) -> bool {
        self.allow_credentials.is_empty()
            || self
                .allow_credentials
                .iter()
                .any(|c| c.id.as_slice() == credential_id)
    }
}

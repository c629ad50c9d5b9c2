//! The two WebAuthn ceremonies, from issuing options to accepting a response.
//!
//! [`RelyingParty`] holds no per-ceremony state. The begin operations return a state value that
//! the caller keeps server side and hands back to the matching finish operation, which consumes
//! it. Verification has no side effects: a successful finish returns what the caller must
//! persist, and any failure leaves storage untouched.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use passkey_rp_types::{
    authenticator::{Aaguid, Flags},
    crypto::sha256,
    rand::random_vec,
    webauthn::{AuthenticatorResponse, PublicKeyCredential, PublicKeyCredentialType},
    Bytes,
};

use crate::{
    config::{ConfigError, RelyingPartyConfig},
    credential_store::{CredentialStore, StoreError},
    metadata::{MetadataLookup, MetadataProvider},
    Error, ErrorKind,
};

mod authentication;
mod registration;


pub(crate) use authentication::check_sign_count;
pub use authentication::AssertionResult;
pub use registration::RegistrationResult;

/// Answers the ownership questions the ceremonies ask about credential ids.
///
/// Every [`CredentialStore`] implements it.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialOwnership: Send + Sync {
    /// Whether any user already registered a credential with this id.
    async fn is_registered(&self, credential_id: &[u8]) -> Result<bool, Error>;

    /// Whether the credential belongs to the user handle.
    async fn owns(&self, user_handle: &[u8], credential_id: &[u8]) -> Result<bool, Error>;
}

#[async_trait::async_trait]
impl<S: CredentialStore> CredentialOwnership for S {
    async fn is_registered(&self, credential_id: &[u8]) -> Result<bool, Error> {
        let owners = self.list_users_for_credential_id(credential_id).await?;
        Ok(!owners.is_empty())
    }

    async fn owns(&self, user_handle: &[u8], credential_id: &[u8]) -> Result<bool, Error> {
        match self.get_credential_by_id(credential_id).await? {
            Some(credential) => Ok(credential.user_handle.as_slice() == user_handle),
            None => Err(StoreError::NotFound.into()),
        }
    }
}

/// A relying party: its configuration and, optionally, a source of authenticator metadata.
#[derive(Clone)]
pub struct RelyingParty {
    config: RelyingPartyConfig,
    timeout: TimeDelta,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl std::fmt::Debug for RelyingParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("config", &self.config)
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl RelyingParty {
    /// Create a relying party from a validated configuration.
    pub fn new(config: RelyingPartyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let timeout = TimeDelta::from_std(config.timeout)
            .map_err(|_| ConfigError::InvalidTimeout(config.timeout))?;
        Ok(Self {
            config,
            timeout,
            metadata: None,
        })
    }

    /// Evaluate attestation trust paths with the given metadata.
    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    /// Read access to the configuration.
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    fn challenge(&self) -> Bytes {
        random_vec(self.config.challenge_len).into()
    }

    fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + self.timeout
    }

    /// The `timeout` member of issued options, in milliseconds.
    fn timeout_ms(&self) -> u32 {
        u32::try_from(self.config.timeout.as_millis()).unwrap_or(u32::MAX)
    }

    fn metadata_for(&self, aaguid: &Aaguid) -> MetadataLookup {
        self.metadata
            .as_ref()
            .map_or(MetadataLookup::Unavailable, |provider| provider.lookup(aaguid))
    }

    /// `SHA-256` of the configured RP ID.
    fn rp_id_hash(&self) -> [u8; 32] {
        sha256(self.config.rp_id.as_bytes())
    }
}

/// Checks shared by both ceremonies on the credential envelope.
fn check_credential<R: AuthenticatorResponse>(
    credential: &PublicKeyCredential<R>,
) -> Result<(), Error> {
    if credential.ty != PublicKeyCredentialType::PublicKey {
        return Err(Error::malformed("credential type is not public-key"));
    }
    if !credential.id_matches_raw_id() {
        return Err(Error::malformed("credential id does not match rawId"));
    }
    Ok(())
}

/// Log a rejected ceremony before handing the error back.
fn rejected(ceremony: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| {
        log::warn!("{ceremony} rejected: {err}");
        err
    }
}

fn user_presence(flags: Flags) -> Result<(), Error> {
    if flags.contains(Flags::UP) {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::UserPresenceRequired,
            "user presence flag is not set",
        ))
    }
}

fn user_verification(flags: Flags, required: bool) -> Result<(), Error> {
    if required && !flags.contains(Flags::UV) {
        Err(Error::new(
            ErrorKind::UserVerificationRequired,
            "user verification is required but the flag is not set",
        ))
    } else {
        Ok(())
    }
}

use chrono::Utc;
use passkey_rp_types::{
    authenticator::{AuthenticatorData, Flags},
    crypto::sha256,
    webauthn::{
        AuthenticatedPublicKeyCredential, AuthenticationExtensionsClientInputs, ClientDataType,
        CredentialRequestOptions, PublicKeyCredentialDescriptor, PublicKeyCredentialRequestOptions,
        UserVerificationRequirement,
    },
    Bytes,
};

use super::{
    check_credential, rejected, user_presence, user_verification, CredentialOwnership,
    RelyingParty,
};
use crate::{
    client_data::verify_client_data,
    credential_store::StoredCredential,
    crypto,
    device_public_key::{self, DeviceKeyMatch},
    state::{AssertionState, Expiring},
    Error, ErrorKind,
};

/// What a successful assertion changes about the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// The credential that signed.
    pub credential_id: Bytes,
    /// The owner of the credential.
    pub user_handle: Bytes,
    /// The counter to store.
    pub new_sign_count: u32,
    /// The backup state reported by the authenticator.
    pub backed_up: bool,
    /// Whether the UV flag was set.
    pub user_verified: bool,
    /// A device key not seen before for this credential, to append to the stored list.
    pub new_device_public_key: Option<Bytes>,
}

impl RelyingParty {
    /// Issue request options.
    ///
    /// With an empty `allow_credentials` the client may use any discoverable credential for the
    /// RP ID, and the response must then carry a user handle.
    pub fn begin_assertion(
        &self,
        allow_credentials: Vec<PublicKeyCredentialDescriptor>,
        user_verification: UserVerificationRequirement,
        extensions: Option<AuthenticationExtensionsClientInputs>,
    ) -> (CredentialRequestOptions, AssertionState) {
        let challenge = self.challenge();
        let options = PublicKeyCredentialRequestOptions {
            challenge: challenge.clone(),
            timeout: Some(self.timeout_ms()),
            rp_id: Some(self.config.rp_id.clone()),
            allow_credentials: (!allow_credentials.is_empty()).then(|| allow_credentials.clone()),
            user_verification,
            hints: None,
            extensions,
        };
        let state = AssertionState {
            challenge,
            allow_credentials,
            user_verification,
            expires_at: self.expires_at(),
        };
        log::debug!(
            "issued request options for {} credentials",
            state.allow_credentials.len()
        );

        (CredentialRequestOptions { public_key: options }, state)
    }

    /// Verify the response to options issued by [`Self::begin_assertion`].
    ///
    /// `credential` is the stored record for the response's credential id. When the response
    /// carries a user handle, `ownership` must confirm it owns the credential.
    pub async fn finish_assertion<O>(
        &self,
        state: AssertionState,
        response: &AuthenticatedPublicKeyCredential,
        credential: &StoredCredential,
        ownership: &O,
    ) -> Result<AssertionResult, Error>
    where
        O: CredentialOwnership + ?Sized,
    {
        let now = Utc::now();
        let mut result = state
            .check_expiry(now)
            .and_then(|()| self.verify_assertion(&state, response, credential))
            .map_err(rejected("assertion"))?;

        match &response.response.user_handle {
            Some(handle) => {
                if !ownership.owns(handle, &credential.credential_id).await? {
                    let err = Error::new(
                        ErrorKind::UserHandleMismatch,
                        "user handle does not own the credential",
                    );
                    log::warn!("assertion rejected: {err}");
                    return Err(err);
                }
                result.user_handle = handle.clone();
            }
            None if state.allow_credentials.is_empty() => {
                let err = Error::new(
                    ErrorKind::UserHandleMismatch,
                    "a discoverable credential response must carry a user handle",
                );
                log::warn!("assertion rejected: {err}");
                return Err(err);
            }
            None => {}
        }

        log::debug!("assertion verified, sign count {}", result.new_sign_count);
        Ok(result)
    }

    fn verify_assertion(
        &self,
        state: &AssertionState,
        response: &AuthenticatedPublicKeyCredential,
        credential: &StoredCredential,
    ) -> Result<AssertionResult, Error> {
        check_credential(response)?;
        if !state.allows(&response.raw_id) {
            return Err(Error::new(
                ErrorKind::CredentialNotFound,
                "credential was not in the allow list",
            ));
        }
        if response.raw_id != credential.credential_id {
            return Err(Error::new(
                ErrorKind::CredentialNotFound,
                "stored credential does not match the response",
            ));
        }

        let client_data_json = response.response.client_data_json.as_slice();
        verify_client_data(
            &self.config,
            client_data_json,
            ClientDataType::Get,
            &state.challenge,
        )?;
        let client_data_hash = sha256(client_data_json);

        let raw_auth_data = response.response.authenticator_data.as_slice();
        let auth_data = AuthenticatorData::from_slice(raw_auth_data)?;
        if auth_data.rp_id_hash() != &self.rp_id_hash() {
            return Err(Error::new(
                ErrorKind::RpIdMismatch,
                format!("rpIdHash is not the hash of {}", self.config.rp_id),
            ));
        }
        user_presence(auth_data.flags)?;
        user_verification(auth_data.flags, state.user_verification.is_required())?;

        if !auth_data.flags.has_valid_backup_state() {
            return Err(Error::new(
                ErrorKind::MalformedAuthenticatorData,
                "backup state is set without backup eligibility",
            ));
        }
        if auth_data.flags.contains(Flags::BE) != credential.backup_eligible {
            return Err(Error::new(
                ErrorKind::BackupPolicyViolation,
                "backup eligibility changed since registration",
            ));
        }
        let backed_up = auth_data.flags.contains(Flags::BS);
        if !self.config.backed_up_policy.permits(backed_up) {
            return Err(Error::new(
                ErrorKind::BackupPolicyViolation,
                "backup state is not permitted by policy",
            ));
        }

        let signed_data = [raw_auth_data, &client_data_hash].concat();
        crypto::verify_signature(
            &credential.public_key,
            &signed_data,
            &response.response.signature,
        )?;

        let new_sign_count = check_sign_count(credential.sign_count, auth_data.counter)?;

        let new_device_public_key = match &response.client_extension_results.device_pub_key {
            Some(outputs) => {
                let key = device_public_key::verify(outputs, &auth_data, &signed_data)?;
                match device_public_key::match_stored(
                    &key,
                    &credential.device_public_keys,
                    credential.backup_eligible,
                )? {
                    DeviceKeyMatch::Known => None,
                    DeviceKeyMatch::New(dpk) => Some(dpk),
                }
            }
            None => None,
        };

        Ok(AssertionResult {
            credential_id: credential.credential_id.clone(),
            user_handle: credential.user_handle.clone(),
            new_sign_count,
            backed_up,
            user_verified: auth_data.flags.contains(Flags::UV),
            new_device_public_key,
        })
    }
}

/// The counter must grow, unless the authenticator has none and both values are zero.
pub(crate) fn check_sign_count(stored: u32, received: u32) -> Result<u32, Error> {
    if (stored != 0 || received != 0) && received <= stored {
        return Err(Error::new(
            ErrorKind::PossibleCloning,
            format!("sign count went from {stored} to {received}"),
        ));
    }
    Ok(received)
}

use chrono::{DateTime, Utc};
use passkey_rp_types::{
    authenticator::{AttestationObject, AuthenticatorData, Flags, MAX_CREDENTIAL_ID_LEN},
    crypto::sha256,
    webauthn::{
        AttestationConveyancePreference, AuthenticationExtensionsClientInputs,
        AuthenticatorSelectionCriteria, ClientDataType, CreatedPublicKeyCredential,
        CredentialCreationOptions, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, PublicKeyCredentialRpEntity,
        PublicKeyCredentialUserEntity,
    },
};

use super::{
    check_credential, rejected, user_presence, user_verification, CredentialOwnership,
    RelyingParty,
};
use crate::{
    attestation::{
        self, AttestationFormat, AttestationType, VerificationOptions, VerifiedAttestation,
    },
    client_data::verify_client_data,
    credential_store::{RelyingPartyUser, StoredCredential},
    device_public_key,
    metadata::MetadataStatus,
    state::{Expiring, RegistrationState},
    Error, ErrorKind,
};

/// A credential that passed registration, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// The record to store.
    pub credential: StoredCredential,
    /// The verified attestation.
    pub attestation: VerifiedAttestation,
    /// Whether metadata anchored the attestation.
    pub metadata: MetadataStatus,
    /// Whether the UV flag was set.
    pub user_verified: bool,
}

impl RelyingParty {
    /// Issue creation options for `user`.
    ///
    /// `exclude_credentials` should list every credential the user already has so that an
    /// authenticator holding one of them refuses to register again.
    pub fn begin_registration(
        &self,
        user: &RelyingPartyUser,
        exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
        authenticator_selection: Option<AuthenticatorSelectionCriteria>,
        attestation: AttestationConveyancePreference,
        extensions: Option<AuthenticationExtensionsClientInputs>,
    ) -> (CredentialCreationOptions, RegistrationState) {
        let challenge = self.challenge();
        let user_verification = authenticator_selection
            .as_ref()
            .map(|selection| selection.user_verification)
            .unwrap_or_default();
        let device_public_key = extensions
            .as_ref()
            .is_some_and(|ext| ext.device_pub_key.is_some());

        let options = PublicKeyCredentialCreationOptions {
            rp: PublicKeyCredentialRpEntity {
                id: Some(self.config.rp_id.clone()),
                name: self.config.rp_name.clone(),
            },
            user: PublicKeyCredentialUserEntity {
                id: user.id.clone(),
                display_name: user.display_name.clone(),
                name: user.name.clone(),
            },
            challenge: challenge.clone(),
            pub_key_cred_params: self
                .config
                .algorithms
                .iter()
                .copied()
                .map(PublicKeyCredentialParameters::public_key)
                .collect(),
            timeout: Some(self.timeout_ms()),
            exclude_credentials: (!exclude_credentials.is_empty()).then_some(exclude_credentials),
            authenticator_selection,
            hints: None,
            attestation,
            attestation_formats: None,
            extensions,
        };
        let state = RegistrationState {
            challenge,
            user: user.clone(),
            user_verification,
            algorithms: self.config.algorithms.clone(),
            device_public_key,
            expires_at: self.expires_at(),
        };
        log::debug!("issued creation options for user {}", user.name);

        (CredentialCreationOptions { public_key: options }, state)
    }

    /// Verify the response to options issued by [`Self::begin_registration`].
    ///
    /// `ownership` is asked whether the new credential id is already registered, in which case
    /// the ceremony fails with [`ErrorKind::DuplicateCredential`]. Persisting the returned
    /// credential should still be an insert-if-absent, as another ceremony may race this one.
    pub async fn finish_registration<O>(
        &self,
        state: RegistrationState,
        response: &CreatedPublicKeyCredential,
        ownership: &O,
    ) -> Result<RegistrationResult, Error>
    where
        O: CredentialOwnership + ?Sized,
    {
        let now = Utc::now();
        let result = state
            .check_expiry(now)
            .and_then(|()| self.verify_registration(state, response, now))
            .map_err(rejected("registration"))?;

        if ownership
            .is_registered(&result.credential.credential_id)
            .await?
        {
            let err = Error::new(
                ErrorKind::DuplicateCredential,
                "credential id is already registered",
            );
            log::warn!("registration rejected: {err}");
            return Err(err);
        }
        log::debug!(
            "registered a credential with {} attestation",
            result.attestation.format
        );
        Ok(result)
    }

    fn verify_registration(
        &self,
        state: RegistrationState,
        response: &CreatedPublicKeyCredential,
        now: DateTime<Utc>,
    ) -> Result<RegistrationResult, Error> {
        check_credential(response)?;
        let client_data_json = response.response.client_data_json.as_slice();
        verify_client_data(
            &self.config,
            client_data_json,
            ClientDataType::Create,
            &state.challenge,
        )?;
        let client_data_hash = sha256(client_data_json);

        let attestation_object =
            AttestationObject::from_slice(&response.response.attestation_object)?;
        let auth_data = AuthenticatorData::from_slice(&attestation_object.auth_data)?;
        if auth_data.rp_id_hash() != &self.rp_id_hash() {
            return Err(Error::new(
                ErrorKind::RpIdMismatch,
                format!("rpIdHash is not the hash of {}", self.config.rp_id),
            ));
        }

        user_presence(auth_data.flags)?;
        user_verification(auth_data.flags, state.user_verification.is_required())?;
        self.check_backup_flags(auth_data.flags)?;

        let acd = auth_data
            .attested_credential_data
            .as_ref()
            .ok_or_else(|| Error::malformed_attestation("missing attested credential data"))?;
        if acd.credential_id().len() > MAX_CREDENTIAL_ID_LEN {
            return Err(Error::malformed(format!(
                "credential id is longer than {MAX_CREDENTIAL_ID_LEN} bytes"
            )));
        }
        if acd.credential_id() != response.raw_id.as_slice() {
            return Err(Error::malformed(
                "credential id in authenticator data does not match rawId",
            ));
        }
        let alg = acd.credential_public_key.alg();
        if !state.algorithms.contains(&alg) {
            return Err(Error::new(
                ErrorKind::UnsupportedKeyType,
                format!("credential algorithm {alg:?} was not offered"),
            ));
        }

        let attestation = match attestation_object.fmt.parse::<AttestationFormat>() {
            Ok(format) => attestation::verify(
                format,
                &attestation_object.att_stmt,
                &attestation_object.auth_data,
                &client_data_hash,
                &VerificationOptions {
                    now,
                    timestamp_drift_tolerance: self.config.timestamp_drift_tolerance,
                },
            )?,
            Err(_) if self.config.attestation.accept_unknown_formats => {
                log::debug!(
                    "treating unknown attestation format {} as none",
                    attestation_object.fmt
                );
                VerifiedAttestation {
                    format: AttestationFormat::None,
                    attestation_type: AttestationType::None,
                    trust_path: Vec::new(),
                }
            }
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::UnsupportedAttestationFormat,
                    format!("attestation format `{}`", attestation_object.fmt),
                ))
            }
        };
        let metadata = attestation::evaluate_trust(
            &attestation,
            &acd.aaguid,
            self.metadata_for(&acd.aaguid),
            &self.config.attestation,
            now,
        )?;

        let mut device_public_keys = Vec::new();
        if let Some(outputs) = &response.client_extension_results.device_pub_key {
            let signed_data = [attestation_object.auth_data.as_slice(), &client_data_hash].concat();
            let device_key = device_public_key::verify(outputs, &auth_data, &signed_data)?;
            device_public_keys.push(device_key.dpk());
        } else if state.device_public_key {
            log::debug!("devicePubKey was requested but not returned");
        }

        let credential = StoredCredential {
            credential_id: acd.credential_id().into(),
            user_handle: state.user.id,
            public_key: acd.credential_public_key.clone(),
            sign_count: auth_data.counter,
            transports: response.response.transports.clone(),
            attestation_format: attestation_object.fmt.clone(),
            aaguid: acd.aaguid,
            backup_eligible: auth_data.flags.contains(Flags::BE),
            backed_up: auth_data.flags.contains(Flags::BS),
            device_public_keys,
            registered_at: now,
        };

        Ok(RegistrationResult {
            credential,
            attestation,
            metadata,
            user_verified: auth_data.flags.contains(Flags::UV),
        })
    }

    pub(super) fn check_backup_flags(&self, flags: Flags) -> Result<(), Error> {
        if !flags.has_valid_backup_state() {
            return Err(Error::new(
                ErrorKind::MalformedAuthenticatorData,
                "backup state is set without backup eligibility",
            ));
        }
        if !self
            .config
            .backup_eligible_policy
            .permits(flags.contains(Flags::BE))
        {
            return Err(Error::new(
                ErrorKind::BackupPolicyViolation,
                "backup eligibility is not permitted by policy",
            ));
        }
        if !self.config.backed_up_policy.permits(flags.contains(Flags::BS)) {
            return Err(Error::new(
                ErrorKind::BackupPolicyViolation,
                "backup state is not permitted by policy",
            ));
        }
        Ok(())
    }
}

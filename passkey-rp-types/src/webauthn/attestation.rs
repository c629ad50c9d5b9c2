//! Types specific to public key credential creation
use coset::iana;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{
        i64_to_iana, ignore_unknown, ignore_unknown_opt_vec, ignore_unknown_vec, maybe_stringified,
    },
    webauthn::{
        AuthenticationExtensionsClientInputs, AuthenticatorAttachment, AuthenticatorTransport,
        PublicKeyCredential, PublicKeyCredentialDescriptor, PublicKeyCredentialHints,
        PublicKeyCredentialType, UserVerificationRequirement,
    },
    Bytes,
};

#[cfg(doc)]
use crate::authenticator::{AttestationObject, AuthenticatorData};

/// The response to the successful creation of a PublicKeyCredential
#[typeshare]
pub type CreatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAttestationResponse>;

/// The argument to [`navigator.credentials.create`], serialized the way
/// `PublicKeyCredential.parseCreationOptionsFromJSON()` expects.
///
/// <https://w3c.github.io/webauthn/#sctn-credentialcreationoptions-extension>
///
/// [`navigator.credentials.create`]: https://developer.mozilla.org/en-US/docs/Web/API/CredentialsContainer/create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct CredentialCreationOptions {
    /// The key defining that this is a request for a webauthn credential.
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// This defines the request for creating a [`PublicKeyCredential`].
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialCreationOptions {
    /// The relying party responsible for the request.
    pub rp: PublicKeyCredentialRpEntity,

    /// The user account the credential is created for.
    pub user: PublicKeyCredentialUserEntity,

    /// A fresh random value the authenticator signs over, indirectly, through the client data.
    ///
    /// See the [Cryptographic Challenges] security consideration.
    ///
    /// [Cryptographic Challenges]: https://w3c.github.io/webauthn/#sctn-cryptographic-challenges
    pub challenge: Bytes,

    /// Key types and signature algorithms the relying party accepts, most preferred first.
    #[serde(deserialize_with = "ignore_unknown_vec")]
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,

    /// How long, in milliseconds, the relying party is willing to wait. Treated as a hint.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "maybe_stringified"
    )]
    pub timeout: Option<u32>,

    /// Credentials already registered for this user, so that an authenticator which holds one of
    /// them does not create a second credential.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// Requirements on the authenticator taking part in the ceremony.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// Hints for the user agent, most preferred first.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub hints: Option<Vec<PublicKeyCredentialHints>>,

    /// The relying party's preference regarding attestation conveyance.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub attestation: AttestationConveyancePreference,

    /// Preferred attestation statement formats, most preferred first. Advisory only.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub attestation_formats: Option<Vec<AttestationStatementFormatIdentifiers>>,

    /// Client extension inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<AuthenticationExtensionsClientInputs>,
}

/// The relying party as presented to the user.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrpentity>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialRpEntity {
    /// The [RP ID]. When omitted the client uses the origin's effective domain.
    ///
    /// [RP ID]: https://w3c.github.io/webauthn/#rp-id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human palatable name, intended only for display.
    pub name: String,
}

/// The user account a credential is created for.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialuserentity>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle: an opaque, at most 64 byte, identifier that MUST NOT contain personally
    /// identifying information. Authorization decisions are made on this value only.
    ///
    /// See [User Handle Contents](https://w3c.github.io/webauthn/#sctn-user-handle-privacy).
    pub id: Bytes,

    /// Human palatable name for the account, intended only for display.
    pub display_name: String,

    /// Human palatable identifier for the account, e.g. a username or an e-mail address.
    pub name: String,
}

/// A key type and signature algorithm the relying party accepts.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialparameters>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialParameters {
    /// Always [`PublicKeyCredentialType::PublicKey`].
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The COSE algorithm identifier.
    #[serde(with = "i64_to_iana")]
    #[typeshare(serialized_as = "I54")] // because i64 fails for js
    pub alg: iana::Algorithm,
}

impl PublicKeyCredentialParameters {
    /// A public key parameter for the given algorithm.
    pub fn public_key(alg: iana::Algorithm) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }

    /// The algorithms WebAuthn recommends relying parties to support:
    /// * [`iana::Algorithm::ES256`]
    /// * [`iana::Algorithm::EdDSA`]
    /// * [`iana::Algorithm::ES384`]
    /// * [`iana::Algorithm::RS256`]
    pub fn default_algorithms() -> Vec<Self> {
        [
            iana::Algorithm::ES256,
            iana::Algorithm::EdDSA,
            iana::Algorithm::ES384,
            iana::Algorithm::RS256,
        ]
        .into_iter()
        .map(Self::public_key)
        .collect()
    }
}

/// Requirements on the authenticator attributes.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorSelectionCriteria {
    /// Restrict eligible authenticators to the given attachment modality.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown",
        default
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// The extent to which a [discoverable credential] is desired.
    ///
    /// [discoverable credential]: https://w3c.github.io/webauthn/#client-side-discoverable-credential
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown",
        default
    )]
    pub resident_key: Option<ResidentKeyRequirement>,

    /// WebAuthn Level 1 compatibility. Should be `true` exactly when [`Self::resident_key`] is
    /// [`ResidentKeyRequirement::Required`].
    #[serde(default)]
    pub require_resident_key: bool,

    /// The user verification requirement for the `create()` operation.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,
}

/// The relying party's requirement for client-side [discoverable credentials].
///
/// <https://w3c.github.io/webauthn/#enumdef-residentkeyrequirement>
///
/// [discoverable credentials]: https://w3c.github.io/webauthn/#client-side-discoverable-credential
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum ResidentKeyRequirement {
    /// Prefer a server-side credential.
    Discouraged,

    /// Prefer a discoverable credential.
    Preferred,

    /// Fail unless a discoverable credential is created.
    Required,
}

/// The relying party's preference regarding [attestation conveyance].
///
/// <https://w3c.github.io/webauthn/#enumdef-attestationconveyancepreference>
///
/// [attestation conveyance]: https://w3c.github.io/webauthn/#attestation-conveyance
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AttestationConveyancePreference {
    /// No interest in attestation. The client replaces non self attestations with `none`.
    #[default]
    None,

    /// A verifiable attestation is wanted, but the client may anonymize it.
    Indirect,

    /// The attestation exactly as generated by the authenticator.
    Direct,

    /// An attestation that may uniquely identify the authenticator, for managed deployments.
    Enterprise,
}

/// Attestation statement format identifiers registered in the [IANA WebAuthn registry][1].
///
/// [1]: https://www.iana.org/assignments/webauthn/webauthn.xhtml#webauthn-attestation-statement-format-ids
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare]
pub enum AttestationStatementFormatIdentifiers {
    /// WebAuthn optimized compact format.
    Packed,

    /// Trusted Platform Module attestation.
    Tpm,

    /// Android hardware key attestation.
    AndroidKey,

    /// Android SafetyNet attestation.
    AndroidSafetynet,

    /// FIDO U2F security keys.
    FidoU2f,

    /// Apple platform authenticators.
    Apple,

    /// No attestation.
    #[default]
    None,
}

/// The authenticator's response to `navigator.credentials.create()`, as produced by
/// `AuthenticatorAttestationResponse.toJSON()`.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorattestationresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAttestationResponse {
    /// The exact JSON serialization of the [`CollectedClientData`](crate::webauthn::CollectedClientData)
    /// that was hashed by the authenticator.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// Convenience copy of the [`AuthenticatorData`] found in the attestation object. The copy in
    /// the attestation object is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_data: Option<Bytes>,

    /// DER SubjectPublicKeyInfo of the new credential, when the client could produce it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Bytes>,

    /// COSE algorithm identifier of the new credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "Option<I54>")]
    pub public_key_algorithm: Option<i64>,

    /// The CBOR [`AttestationObject`].
    pub attestation_object: Bytes,

    /// Transports the authenticator is believed to support. Relying parties store these and send
    /// them back in [`PublicKeyCredentialDescriptor::transports`].
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

//! Types used for public key authentication

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec, maybe_stringified},
    webauthn::{
        AuthenticationExtensionsClientInputs, PublicKeyCredential, PublicKeyCredentialDescriptor,
        PublicKeyCredentialHints, UserVerificationRequirement,
    },
    Bytes,
};

#[cfg(doc)]
use crate::{
    authenticator::AuthenticatorData,
    webauthn::{CollectedClientData, PublicKeyCredentialUserEntity},
};

/// The response to the successful authentication of a [`PublicKeyCredential`]
#[typeshare]
pub type AuthenticatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAssertionResponse>;

/// The argument to [`navigator.credentials.get`], serialized the way
/// `PublicKeyCredential.parseRequestOptionsFromJSON()` expects.
///
/// <https://w3c.github.io/webauthn/#sctn-credentialrequestoptions-extension>
///
/// [`navigator.credentials.get`]: https://developer.mozilla.org/en-US/docs/Web/API/CredentialsContainer/get
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct CredentialRequestOptions {
    /// The key defining that this is a request for a webauthn credential.
    pub public_key: PublicKeyCredentialRequestOptions,
}

/// This type supplies `get()` requests with the data it needs to generate an assertion.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrequestoptions>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialRequestOptions {
    /// A fresh random value the authenticator signs over, indirectly, through the client data.
    pub challenge: Bytes,

    /// How long, in milliseconds, the relying party is willing to wait. Treated as a hint.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "maybe_stringified"
    )]
    pub timeout: Option<u32>,

    /// The RP ID the credential must be scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,

    /// The credentials of an already identified user account, most preferred first.
    ///
    /// Left empty when the user is not known yet, in which case only discoverable credentials can
    /// answer and the account is identified by the returned
    /// [`AuthenticatorAssertionResponse::user_handle`].
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// The user verification requirement for the `get()` operation.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,

    /// Hints for the user agent, most preferred first.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub hints: Option<Vec<PublicKeyCredentialHints>>,

    /// Client extension inputs.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub extensions: Option<AuthenticationExtensionsClientInputs>,
}

/// The authenticator's response to `navigator.credentials.get()`, as produced by
/// `AuthenticatorAssertionResponse.toJSON()`.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorassertionresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAssertionResponse {
    /// The exact JSON serialization of the [`CollectedClientData`] that was hashed by the
    /// authenticator.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// The raw [`AuthenticatorData`] the signature covers.
    pub authenticator_data: Bytes,

    /// The assertion signature over `authenticatorData || SHA-256(clientDataJSON)`.
    pub signature: Bytes,

    /// The user handle the credential was created with, mirrors
    /// [`PublicKeyCredentialUserEntity::id`]. Always present for discoverable credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,

    /// Attestation in assertions is not used by this library but accepted on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_object: Option<Bytes>,
}

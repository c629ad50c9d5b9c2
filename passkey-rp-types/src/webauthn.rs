//! Implementation of the JSON types defined in [WebAuthn Level 3] that a relying party sends to
//! and receives from the browser.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{utils::serde::ignore_unknown, Bytes};

mod assertion;
mod attestation;
mod client_data;
mod common;
mod extensions;

// re-export types
pub use self::{assertion::*, attestation::*, client_data::*, common::*, extensions::*};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::AuthenticatorAssertionResponse {}
    impl Sealed for super::AuthenticatorAttestationResponse {}
}

/// Marker trait for response types
pub trait AuthenticatorResponse: sealed::Sealed {
    /// The raw `clientDataJSON` bytes, exactly as the authenticator hashed them.
    fn client_data_json(&self) -> &[u8];
}

impl AuthenticatorResponse for AuthenticatorAssertionResponse {
    fn client_data_json(&self) -> &[u8] {
        &self.client_data_json
    }
}

impl AuthenticatorResponse for AuthenticatorAttestationResponse {
    fn client_data_json(&self) -> &[u8] {
        &self.client_data_json
    }
}

/// This is the response from a successful creation or assertion of a credential, in the shape
/// produced by `PublicKeyCredential.toJSON()`.
///
/// It is recommended to use the type aliases depending on which response you are expecting:
/// * Credential Creation: [CreatedPublicKeyCredential]
/// * Credential assertion: [AuthenticatedPublicKeyCredential]
///
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredential<R: AuthenticatorResponse> {
    /// The base64url encoding of [Self::raw_id].
    pub id: String,

    /// The credential ID chosen by the authenticator.
    pub raw_id: Bytes,

    /// Always [PublicKeyCredentialType::PublicKey] for webauthn credentials.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The authenticator's response, either an [AuthenticatorAttestationResponse] for
    /// registration or an [AuthenticatorAssertionResponse] for authentication.
    pub response: R,

    /// This reports the modality of the communication between the client and authenticator.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Map of extension identifier to client extension output.
    #[serde(default)]
    pub client_extension_results: AuthenticationExtensionsClientOutputs,
}

impl<R: AuthenticatorResponse> PublicKeyCredential<R> {
    /// Whether [Self::id] is consistent with [Self::raw_id].
    pub fn id_matches_raw_id(&self) -> bool {
        crate::encoding::try_from_base64url(&self.id).as_deref() == Some(self.raw_id.as_slice())
    }
}

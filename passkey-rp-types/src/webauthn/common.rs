//! Common types used in both Attestation (registration) and Assertion (authentication).

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    Bytes,
};

#[cfg(doc)]
use crate::webauthn::{
    AuthenticatorAttestationResponse, PublicKeyCredential, PublicKeyCredentialCreationOptions,
    PublicKeyCredentialRequestOptions,
};

/// The valid credential types. Only `public-key` is defined at the moment.
///
/// <https://w3c.github.io/webauthn/#enumdef-publickeycredentialtype>
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum PublicKeyCredentialType {
    /// The public counterpart of an asymmetric key pair.
    #[default]
    PublicKey,
    /// Any value this library does not know about.
    #[serde(other)]
    Unknown,
}

/// Identifies a specific public key credential.
///
/// A relying party sends these in [`PublicKeyCredentialCreationOptions::exclude_credentials`] so
/// an authenticator does not register the same user twice, and in
/// [`PublicKeyCredentialRequestOptions::allow_credentials`] to tell the client which credentials
/// may answer the assertion.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialDescriptor {
    /// The type of the credential, mirrors [`PublicKeyCredential::ty`].
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The credential ID, mirrors [`PublicKeyCredential::raw_id`].
    pub id: Bytes,

    /// The transports stored from [`AuthenticatorAttestationResponse::transports`] at registration.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// Describe a public key credential by its id and known transports.
    pub fn new(id: Bytes, transports: Option<Vec<AuthenticatorTransport>>) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            id,
            transports,
        }
    }

    /// Checks whether [`Self::ty`] is not of value [`PublicKeyCredentialType::Unknown`].
    pub fn is_known(&self) -> bool {
        match self.ty {
            PublicKeyCredentialType::PublicKey => true,
            PublicKeyCredentialType::Unknown => false,
        }
    }
}

/// A relying party's requirement for [user verification].
///
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>
///
/// [user verification]: https://w3c.github.io/webauthn/#user-verification
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum UserVerificationRequirement {
    /// Fail the ceremony if the UV flag is not set.
    Required,

    /// Ask for user verification but accept responses without it.
    #[default]
    Preferred,

    /// Do not ask for user verification.
    Discouraged,
}

impl UserVerificationRequirement {
    /// Whether a response without the UV flag must be rejected.
    pub fn is_required(&self) -> bool {
        matches!(self, UserVerificationRequirement::Required)
    }
}

/// Hints as to how clients might communicate with a particular authenticator.
///
/// <https://w3c.github.io/webauthn/#enum-transport>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorTransport {
    /// Removable USB.
    Usb,

    /// Near Field Communication.
    Nfc,

    /// Bluetooth Low Energy.
    Ble,

    /// Smart card readers.
    SmartCard,

    /// A combination of data-transport and proximity mechanisms, e.g. a phone used from a desktop.
    #[serde(alias = "cable")]
    Hybrid,

    /// A platform authenticator built into the client device.
    Internal,
}

/// Authenticator attachment modality.
///
/// <https://w3c.github.io/webauthn/#enumdef-authenticatorattachment>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorAttachment {
    /// Built into the client device.
    Platform,

    /// Roaming authenticators such as security keys or phones.
    CrossPlatform,
}

/// Hints to the user agent about how a request may be best completed.
///
/// <https://w3c.github.io/webauthn/#enum-hints>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
#[non_exhaustive]
pub enum PublicKeyCredentialHints {
    /// A physical security key.
    SecurityKey,

    /// A platform authenticator attached to the client device.
    ClientDevice,

    /// A general purpose authenticator such as a smartphone.
    Hybrid,
}

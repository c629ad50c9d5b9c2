use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// The client data represents the contextual bindings of both the Relying Party and the client.
///
/// The relying party never re-serializes it: signatures cover the hash of the exact bytes the
/// client sent, so this type is only parsed from those bytes for inspection. Unknown keys are
/// tolerated and kept in [`Self::unknown_keys`].
///
/// <https://w3c.github.io/webauthn/#dictionary-client-data>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// [`ClientDataType::Create`] at registration and [`ClientDataType::Get`] at authentication.
    /// Prevents a signature made for one ceremony from being replayed into the other.
    #[serde(rename = "type")]
    pub ty: ClientDataType,

    /// The base64url encoding of the challenge provided by the relying party.
    pub challenge: String,

    /// The fully qualified origin of the requester, in the syntax of [RFC6454].
    ///
    /// [RFC6454]: https://www.rfc-editor.org/rfc/rfc6454
    pub origin: String,

    /// `true` when the request was made from a cross-origin iframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,

    /// The origin of the top level document, present for cross-origin requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,

    /// Token binding state of the TLS connection, see [RFC8471].
    ///
    /// [RFC8471]: https://www.rfc-editor.org/rfc/rfc8471
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_binding: Option<TokenBinding>,

    /// Keys unknown to this library, in their original order.
    #[serde(flatten)]
    pub unknown_keys: IndexMap<String, serde_json::Value>,
}

impl CollectedClientData {
    /// Parse the raw `clientDataJSON` bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Used to limit the values of [`CollectedClientData::ty`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, strum::Display)]
#[typeshare]
pub enum ClientDataType {
    /// Serializes to the string `"webauthn.create"`
    #[serde(rename = "webauthn.create")]
    #[strum(serialize = "webauthn.create")]
    Create,

    /// Serializes to the string `"webauthn.get"`
    #[serde(rename = "webauthn.get")]
    #[strum(serialize = "webauthn.get")]
    Get,

    /// Serializes to the string `"payment.get"`, part of Secure Payment Confirmation.
    #[serde(rename = "payment.get")]
    #[strum(serialize = "payment.get")]
    PaymentGet,
}

/// Token binding information reported by the client.
///
/// <https://w3c.github.io/webauthn/#dictdef-tokenbinding>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenBinding {
    /// Whether token binding was used on the connection.
    pub status: TokenBindingStatus,

    /// The base64url encoded token binding ID, required when `status` is `present`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// <https://w3c.github.io/webauthn/#enumdef-tokenbindingstatus>
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    /// Token binding was used when communicating with the relying party.
    Present,
    /// The client supports token binding but it was not negotiated.
    Supported,
    /// Legacy value some clients still send.
    NotSupported,
    /// Anything else, which relying parties must reject.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests;

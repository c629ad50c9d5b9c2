use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    authenticator::{Aaguid, AttestationStatement},
    cose::CredentialPublicKey,
    utils::serde::ignore_unknown,
    webauthn::{AttestationConveyancePreference, AttestationStatementFormatIdentifiers},
    Bytes, CodecError,
};

#[cfg(doc)]
use crate::webauthn::PublicKeyCredential;

/// Client extension inputs a relying party may request.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticationextensionsclientinputs>
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticationExtensionsClientInputs {
    /// Ask the client to report [`CredentialPropertiesOutput`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<bool>,

    /// Ask the authenticator for the [user verification methods] it used.
    ///
    /// [user verification methods]: https://w3c.github.io/webauthn/#sctn-uvm-extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvm: Option<bool>,

    /// Ask for a device bound key alongside a possibly synced credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_pub_key: Option<DevicePublicKeyInputs>,
}

/// Inputs of the device public key extension.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct DevicePublicKeyInputs {
    /// Attestation preference for the device key.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub attestation: AttestationConveyancePreference,

    /// Preferred attestation formats for the device key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_formats: Vec<AttestationStatementFormatIdentifiers>,
}

/// Client extension outputs returned in [`PublicKeyCredential::client_extension_results`].
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticationextensionsclientoutputs>
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticationExtensionsClientOutputs {
    /// Properties of the created credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredentialPropertiesOutput>,

    /// The device public key and its signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_pub_key: Option<DevicePublicKeyOutputs>,
}

/// Credential properties reported by the client at registration.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-credential-properties-extension>
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[typeshare]
pub struct CredentialPropertiesOutput {
    /// Whether the credential is discoverable, absent when unknown.
    #[serde(rename = "rk", default, skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
}

/// Client output of the device public key extension.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct DevicePublicKeyOutputs {
    /// CBOR encoded [`DevicePublicKeyAuthenticatorOutput`].
    pub authenticator_output: Bytes,

    /// Signature by the device key over `authenticatorData || SHA-256(clientDataJSON)`.
    pub signature: Bytes,
}

/// The device public key attestation object produced by the authenticator.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePublicKeyAuthenticatorOutput {
    /// AAGUID of the device holding the key.
    pub aaguid: Aaguid,
    /// The COSE encoded device public key, kept raw so stored keys can be compared byte-wise.
    pub dpk: Vec<u8>,
    /// Scope of the key, `0` for entire device.
    pub scope: u32,
    /// Random nonce, possibly empty.
    pub nonce: Vec<u8>,
    /// Attestation statement format of the device key.
    pub fmt: String,
    /// Attestation statement of the device key.
    pub att_stmt: AttestationStatement,
    /// Whether enterprise attestation was returned.
    pub ep_att: Option<bool>,
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedAttestation(format!("devicePubKey: {}", reason.into()))
}

impl DevicePublicKeyAuthenticatorOutput {
    /// Decode the CBOR map found in [`DevicePublicKeyOutputs::authenticator_output`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let value: Value =
            ciborium::de::from_reader(bytes).map_err(|e| malformed(e.to_string()))?;
        let Value::Map(entries) = value else {
            return Err(malformed("not a map"));
        };

        let mut aaguid = None;
        let mut dpk = None;
        let mut scope = None;
        let mut nonce = Vec::new();
        let mut fmt = None;
        let mut att_stmt = None;
        let mut ep_att = None;
        for (key, value) in entries {
            match (key.as_text().unwrap_or_default(), value) {
                ("aaguid", Value::Bytes(b)) => {
                    aaguid = Some(
                        Aaguid::try_from(b.as_slice()).map_err(|_| malformed("aaguid length"))?,
                    )
                }
                ("dpk", Value::Bytes(b)) => dpk = Some(b),
                ("scope", Value::Integer(i)) => {
                    scope = Some(u32::try_from(i).map_err(|_| malformed("scope range"))?)
                }
                ("nonce", Value::Bytes(b)) => nonce = b,
                ("fmt", Value::Text(t)) => fmt = Some(t),
                ("attStmt", Value::Map(m)) => att_stmt = Some(AttestationStatement(m)),
                ("epAtt", Value::Bool(b)) => ep_att = Some(b),
                (key, _) => return Err(malformed(format!("unexpected entry `{key}`"))),
            }
        }

        Ok(Self {
            aaguid: aaguid.ok_or_else(|| malformed("missing aaguid"))?,
            dpk: dpk.ok_or_else(|| malformed("missing dpk"))?,
            scope: scope.ok_or_else(|| malformed("missing scope"))?,
            nonce,
            fmt: fmt.ok_or_else(|| malformed("missing fmt"))?,
            att_stmt: att_stmt.ok_or_else(|| malformed("missing attStmt"))?,
            ep_att,
        })
    }

    /// Decode [`Self::dpk`].
    pub fn device_key(&self) -> Result<CredentialPublicKey, CodecError> {
        CredentialPublicKey::from_cose(&self.dpk)
    }

    /// Encode back to the CBOR map.
    pub fn to_vec(&self) -> Result<Vec<u8>, CodecError> {
        let mut entries = vec![
            (Value::from("aaguid"), Value::Bytes(self.aaguid.0.to_vec())),
            (Value::from("dpk"), Value::Bytes(self.dpk.clone())),
            (Value::from("scope"), Value::from(self.scope)),
            (Value::from("nonce"), Value::Bytes(self.nonce.clone())),
            (Value::from("fmt"), Value::Text(self.fmt.clone())),
            (Value::from("attStmt"), Value::Map(self.att_stmt.0.clone())),
        ];
        if let Some(ep_att) = self.ep_att {
            entries.push((Value::from("epAtt"), Value::Bool(ep_att)));
        }
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&Value::Map(entries), &mut bytes)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;
        Ok(bytes)
    }
}

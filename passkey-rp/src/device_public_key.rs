//! The device public key extension, which binds a device bound key to a possibly synced
//! credential.

use passkey_rp_types::{
    authenticator::AuthenticatorData,
    webauthn::{DevicePublicKeyAuthenticatorOutput, DevicePublicKeyOutputs},
    Bytes,
};

use crate::{crypto, Error, ErrorKind};

const EXTENSION_ID: &str = "devicePubKey";

/// A device key whose signature over the ceremony was verified.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDeviceKey {
    /// The decoded authenticator output.
    pub output: DevicePublicKeyAuthenticatorOutput,
}

impl VerifiedDeviceKey {
    /// The COSE encoded device key, as stored.
    pub fn dpk(&self) -> Bytes {
        self.output.dpk.clone().into()
    }
}

/// Check the extension output returned by the client.
///
/// `signed_data` is `authenticatorData || SHA-256(clientDataJSON)`.
pub(crate) fn verify(
    outputs: &DevicePublicKeyOutputs,
    auth_data: &AuthenticatorData,
    signed_data: &[u8],
) -> Result<VerifiedDeviceKey, Error> {
    if let Some(in_auth_data) = auth_data.extension(EXTENSION_ID) {
        let raw = in_auth_data.as_bytes().map(Vec::as_slice);
        if raw != Some(outputs.authenticator_output.as_slice()) {
            return Err(Error::malformed(
                "devicePubKey output differs from the authenticator data",
            ));
        }
    }

    let output = DevicePublicKeyAuthenticatorOutput::from_slice(&outputs.authenticator_output)?;
    if output.fmt != "none" || !output.att_stmt.is_empty() {
        return Err(Error::new(
            ErrorKind::UnsupportedAttestationFormat,
            format!("devicePubKey attestation format `{}`", output.fmt),
        ));
    }

    let key = output.device_key()?;
    crypto::verify_signature(&key, signed_data, &outputs.signature)
        .map_err(|e| Error::signature(format!("devicePubKey: {}", e.detail())))?;
    Ok(VerifiedDeviceKey { output })
}

/// What an assertion's device key means for the stored credential.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceKeyMatch {
    /// The key is already known.
    Known,
    /// A key seen for the first time, to be appended.
    New(Bytes),
}

/// Compare a verified device key with the keys stored for the credential.
///
/// A credential that cannot be backed up lives on one device only, so once it has a device key
/// any other key is rejected.
pub(crate) fn match_stored(
    key: &VerifiedDeviceKey,
    stored: &[Bytes],
    backup_eligible: bool,
) -> Result<DeviceKeyMatch, Error> {
    if stored.iter().any(|known| known.as_slice() == key.output.dpk.as_slice()) {
        return Ok(DeviceKeyMatch::Known);
    }
    if !backup_eligible && !stored.is_empty() {
        return Err(Error::new(
            ErrorKind::SignatureInvalid,
            "a device bound credential presented a new device key",
        ));
    }
    Ok(DeviceKeyMatch::New(key.dpk()))
}

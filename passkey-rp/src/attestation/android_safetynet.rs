//! <https://w3c.github.io/webauthn/#sctn-android-safetynet-attestation>

use passkey_rp_types::{crypto::sha256, encoding};
use serde::Deserialize;

use super::{AttestationType, Statement};
use crate::{cert, jws, Error};

const ATTESTATION_HOSTNAME: &str = "attest.android.com";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetResponse {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    cts_profile_match: bool,
}

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    let ver = statement.text("ver")?;
    if ver.is_empty() {
        return Err(Error::malformed_attestation("empty `ver`"));
    }
    let response = std::str::from_utf8(statement.bytes("response")?)
        .map_err(|_| Error::malformed_attestation("`response` is not a JWS"))?;

    let jws = jws::verify(response)?;
    let leaf = jws
        .chain
        .first()
        .ok_or_else(|| Error::malformed_attestation("missing x5c"))?;
    if cert::subject_attribute(leaf, "CN").as_deref() != Some(ATTESTATION_HOSTNAME) {
        return Err(Error::malformed_attestation(format!(
            "attestation certificate is not issued to {ATTESTATION_HOSTNAME}"
        )));
    }

    let payload: SafetyNetResponse = serde_json::from_slice(&jws.payload)
        .map_err(|e| Error::malformed_attestation(format!("safetynet payload: {e}")))?;
    let expected_nonce = encoding::base64(&sha256(&statement.signed_data()));
    if payload.nonce != expected_nonce {
        return Err(Error::malformed_attestation("safetynet nonce does not match"));
    }
    if !payload.cts_profile_match {
        return Err(Error::untrusted("device failed the ctsProfileMatch check"));
    }

    let now = statement.options.now.timestamp_millis();
    let tolerance =
        i64::try_from(statement.options.timestamp_drift_tolerance.as_millis()).unwrap_or(i64::MAX);
    if now.saturating_sub(payload.timestamp_ms) > tolerance {
        return Err(Error::untrusted("safetynet response is too old"));
    }
    if payload.timestamp_ms.saturating_sub(now) > tolerance {
        return Err(Error::untrusted("safetynet response is from the future"));
    }

    Ok((AttestationType::Basic, jws.chain_der))
}

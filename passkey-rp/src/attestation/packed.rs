//! <https://w3c.github.io/webauthn/#sctn-packed-attestation>

use super::{AttestationType, Statement};
use crate::{cert, crypto, crypto::VerifyingKey, Error};

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    let alg = statement.alg()?;
    let sig = statement.bytes("sig")?;
    let credential = statement.credential()?;

    if statement.stmt.get("ecdaaKeyId").is_some() {
        return Err(Error::malformed_attestation("ECDAA is not supported"));
    }

    if statement.stmt.get("x5c").is_none() {
        if alg != credential.credential_public_key.alg() {
            return Err(Error::malformed_attestation(format!(
                "self attestation algorithm {alg:?} does not match the credential key"
            )));
        }
        crypto::verify_signature(
            &credential.credential_public_key,
            &statement.signed_data(),
            sig,
        )?;
        return Ok((AttestationType::SelfAttestation, Vec::new()));
    }

    let chain = statement.x5c()?;
    let leaf = cert::parse(&chain[0])?;
    VerifyingKey::from_certificate(&leaf)?.verify(alg, &statement.signed_data(), sig)?;

    if !cert::is_v3(&leaf) {
        return Err(Error::malformed_attestation(
            "attestation certificate must be version 3",
        ));
    }
    if cert::subject_attribute(&leaf, "OU").as_deref() != Some("Authenticator Attestation") {
        return Err(Error::malformed_attestation(
            "attestation certificate OU must be `Authenticator Attestation`",
        ));
    }
    for attr in ["C", "O", "CN"] {
        if cert::subject_attribute(&leaf, attr).map_or(true, |v| v.is_empty()) {
            return Err(Error::malformed_attestation(format!(
                "attestation certificate subject is missing {attr}"
            )));
        }
    }
    if cert::is_ca(&leaf)? {
        return Err(Error::malformed_attestation(
            "attestation certificate must not be a CA",
        ));
    }
    cert::check_aaguid(&leaf, &credential.aaguid)?;

    Ok((AttestationType::Basic, chain))
}

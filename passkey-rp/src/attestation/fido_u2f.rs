//! <https://w3c.github.io/webauthn/#sctn-fido-u2f-attestation>

use coset::iana;
use passkey_rp_types::cose::{CredentialPublicKey, EcCurve};

use super::{AttestationType, Statement};
use crate::{cert, crypto::VerifyingKey, Error};

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    let sig = statement.bytes("sig")?;
    let chain = statement.x5c()?;
    if chain.len() != 1 {
        return Err(Error::malformed_attestation(
            "fido-u2f requires exactly one attestation certificate",
        ));
    }

    let leaf = cert::parse(&chain[0])?;
    let key = VerifyingKey::from_certificate(&leaf)?;
    if !matches!(key, VerifyingKey::P256(_)) {
        return Err(Error::malformed_attestation(
            "fido-u2f attestation key must be P-256",
        ));
    }

    let credential = statement.credential()?;
    let CredentialPublicKey::Ec2 {
        curve: EcCurve::P256,
        x,
        y,
        ..
    } = &credential.credential_public_key
    else {
        return Err(Error::malformed_attestation(
            "fido-u2f credential key must be P-256",
        ));
    };
    if !credential.aaguid.is_empty() {
        return Err(Error::malformed_attestation("fido-u2f aaguid must be zero"));
    }

    let verification_data = [
        &[0x00][..],
        statement.auth_data.rp_id_hash(),
        statement.client_data_hash,
        credential.credential_id(),
        &[0x04],
        x,
        y,
    ]
    .concat();
    key.verify(iana::Algorithm::ES256, &verification_data, sig)?;

    Ok((AttestationType::Basic, chain))
}

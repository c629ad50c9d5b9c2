//! <https://w3c.github.io/webauthn/#sctn-apple-anonymous-attestation>

use passkey_rp_types::crypto::sha256;
use x509_cert::der::{
    asn1::{ObjectIdentifier, OctetString},
    Any, Decode, Tag, Tagged,
};

use super::{AttestationType, Statement};
use crate::{cert, crypto::VerifyingKey, Error};

const APPLE_NONCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113635.100.8.2");

/// The extension holds `SEQUENCE { [1] EXPLICIT OCTET STRING }`.
fn extension_nonce(value: &[u8]) -> Result<Vec<u8>, Error> {
    let malformed = || Error::malformed_attestation("apple nonce extension is malformed");
    let sequence = Any::from_der(value).map_err(|_| malformed())?;
    if sequence.tag() != Tag::Sequence {
        return Err(malformed());
    }
    let tagged = Any::from_der(sequence.value()).map_err(|_| malformed())?;
    if !tagged.tag().is_context_specific() {
        return Err(malformed());
    }
    OctetString::from_der(tagged.value())
        .map(|octets| octets.as_bytes().to_vec())
        .map_err(|_| malformed())
}

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    let chain = statement.x5c()?;
    let leaf = cert::parse(&chain[0])?;

    let value = cert::extension(&leaf, &APPLE_NONCE)
        .ok_or_else(|| Error::malformed_attestation("missing apple nonce extension"))?;
    if extension_nonce(value)? != sha256(&statement.signed_data()) {
        return Err(Error::malformed_attestation("apple nonce does not match"));
    }

    let credential = statement.credential()?;
    if !VerifyingKey::from_certificate(&leaf)?.matches(&credential.credential_public_key) {
        return Err(Error::malformed_attestation(
            "certificate key does not match the credential key",
        ));
    }

    Ok((AttestationType::AnonCa, chain))
}

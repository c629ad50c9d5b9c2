//! X.509 helpers for attestation certificates.

use chrono::{DateTime, Utc};
use passkey_rp_types::authenticator::Aaguid;
use x509_cert::{
    certificate::Version,
    der::{
        asn1::{ObjectIdentifier, OctetString},
        Decode,
    },
    ext::pkix::{BasicConstraints, ExtendedKeyUsage},
    Certificate,
};

use crate::{crypto::VerifyingKey, Error};

#[cfg(test)]
mod tests;

/// `id-fido-gen-ce-aaguid`
pub(crate) const FIDO_GEN_CE_AAGUID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.45724.1.1.4");
const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

/// Parse a DER certificate.
pub(crate) fn parse(der: &[u8]) -> Result<Certificate, Error> {
    Certificate::from_der(der)
        .map_err(|e| Error::malformed_attestation(format!("invalid certificate: {e}")))
}

/// Parse a chain of DER certificates, leaf first.
pub(crate) fn parse_chain(chain: &[Vec<u8>]) -> Result<Vec<Certificate>, Error> {
    chain.iter().map(|der| parse(der)).collect()
}

/// The raw value of an extension.
pub(crate) fn extension<'a>(cert: &'a Certificate, oid: &ObjectIdentifier) -> Option<&'a [u8]> {
    cert.tbs_certificate
        .extensions
        .as_deref()?
        .iter()
        .find(|ext| &ext.extn_id == oid)
        .map(|ext| ext.extn_value.as_bytes())
}

/// The AAGUID carried in the FIDO extension, if present.
pub(crate) fn aaguid(cert: &Certificate) -> Result<Option<Aaguid>, Error> {
    let Some(value) = extension(cert, &FIDO_GEN_CE_AAGUID) else {
        return Ok(None);
    };
    let octets = OctetString::from_der(value)
        .map_err(|e| Error::malformed_attestation(format!("aaguid extension: {e}")))?;
    Aaguid::try_from(octets.as_bytes())
        .map(Some)
        .map_err(|_| Error::malformed_attestation("aaguid extension is not 16 bytes"))
}

/// Check the AAGUID extension, when present, against the authenticator data.
pub(crate) fn check_aaguid(cert: &Certificate, expected: &Aaguid) -> Result<(), Error> {
    match aaguid(cert)? {
        Some(aaguid) if &aaguid != expected => Err(Error::malformed_attestation(format!(
            "certificate aaguid {aaguid} does not match {expected}"
        ))),
        _ => Ok(()),
    }
}

/// Whether the basic constraints mark the certificate as a CA.
pub(crate) fn is_ca(cert: &Certificate) -> Result<bool, Error> {
    let Some(value) = extension(cert, &BASIC_CONSTRAINTS) else {
        return Ok(false);
    };
    BasicConstraints::from_der(value)
        .map(|bc| bc.ca)
        .map_err(|e| Error::malformed_attestation(format!("basic constraints: {e}")))
}

/// Extended key usages, empty when the extension is absent.
pub(crate) fn extended_key_usages(cert: &Certificate) -> Result<Vec<ObjectIdentifier>, Error> {
    let Some(value) = extension(cert, &EXTENDED_KEY_USAGE) else {
        return Ok(Vec::new());
    };
    ExtendedKeyUsage::from_der(value)
        .map(|eku| eku.0)
        .map_err(|e| Error::malformed_attestation(format!("extended key usage: {e}")))
}

pub(crate) fn is_v3(cert: &Certificate) -> bool {
    cert.tbs_certificate.version == Version::V3
}

/// The value of the first subject attribute named `attr`, e.g. `CN` or `OU`.
pub(crate) fn subject_attribute(cert: &Certificate, attr: &str) -> Option<String> {
    cert.tbs_certificate.subject.0.iter().find_map(|rdn| {
        let rdn = rdn.to_string();
        rdn.strip_prefix(attr)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_owned)
    })
}

pub(crate) fn has_empty_subject(cert: &Certificate) -> bool {
    cert.tbs_certificate.subject.0.is_empty()
}

fn check_validity(cert: &Certificate, now: DateTime<Utc>) -> Result<(), Error> {
    let validity = &cert.tbs_certificate.validity;
    let now = u64::try_from(now.timestamp()).unwrap_or_default();
    let not_before = validity.not_before.to_unix_duration().as_secs();
    let not_after = validity.not_after.to_unix_duration().as_secs();
    if now < not_before || now > not_after {
        return Err(Error::untrusted(format!(
            "certificate {} is not valid at this time",
            cert.tbs_certificate.subject
        )));
    }
    Ok(())
}

/// Verify that `chain`, leaf first, leads to one of `roots`.
///
/// Each certificate must be signed by the next one and be valid at `now`. The last certificate
/// must either be one of the roots or be signed by one.
pub(crate) fn verify_chain(
    chain: &[Certificate],
    roots: &[Certificate],
    now: DateTime<Utc>,
) -> Result<(), Error> {
    let Some(last) = chain.last() else {
        return Err(Error::untrusted("empty certificate chain"));
    };
    for cert in chain {
        check_validity(cert, now)?;
    }
    for pair in chain.windows(2) {
        VerifyingKey::from_certificate(&pair[1])?
            .verify_certificate(&pair[0])
            .map_err(|e| Error::untrusted(format!("broken certificate chain: {}", e.detail())))?;
    }

    if roots.contains(last) {
        return Ok(());
    }
    let anchored = roots.iter().any(|root| {
        root.tbs_certificate.subject == last.tbs_certificate.issuer
            && VerifyingKey::from_certificate(root)
                .and_then(|key| key.verify_certificate(last))
                .is_ok()
    });
    if anchored {
        Ok(())
    } else {
        Err(Error::untrusted(format!(
            "no trusted root for issuer {}",
            last.tbs_certificate.issuer
        )))
    }
}

//! <https://w3c.github.io/webauthn/#sctn-tpm-attestation>
//!
//! The statement carries the TPM's view of the credential key (`pubArea`, a `TPMT_PUBLIC`) and a
//! `TPMS_ATTEST` structure (`certInfo`) signed by the attestation identity key (AIK).

use coset::iana;
use passkey_rp_types::{
    cose::{CredentialPublicKey, EcCurve},
    crypto::{sha256, sha384, sha512},
};
use x509_cert::der::asn1::ObjectIdentifier;

use super::{AttestationType, Statement};
use crate::{cert, crypto::VerifyingKey, Error};

const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_SHA256: u16 = 0x000b;
const TPM_ALG_SHA384: u16 = 0x000c;
const TPM_ALG_SHA512: u16 = 0x000d;
const TPM_ALG_ECC: u16 = 0x0023;

const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;
const TPM_ECC_NIST_P521: u16 = 0x0005;

/// `tcg-kp-AIKCertificate`
const AIK_CERTIFICATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.23.133.8.3");

fn malformed(what: &str) -> Error {
    Error::malformed_attestation(format!("tpm: {what}"))
}

/// Big-endian cursor over TPM structures.
struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.0.len() < len {
            return Err(malformed("truncated structure"));
        }
        let (head, tail) = self.0.split_at(len);
        self.0 = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        self.take(N)?
            .try_into()
            .map_err(|_| malformed("truncated structure"))
    }

    fn u16(&mut self) -> Result<u16, Error> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        self.array().map(u32::from_be_bytes)
    }

    /// A `TPM2B` buffer: u16 size followed by the bytes.
    fn sized(&mut self) -> Result<&'a [u8], Error> {
        let len = self.u16()?;
        self.take(usize::from(len))
    }

    fn finish(self) -> Result<(), Error> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(malformed("trailing bytes"))
        }
    }
}

/// The key part of a `TPMT_PUBLIC`.
enum PublicArea<'a> {
    Rsa { exponent: u32, modulus: &'a [u8] },
    Ecc { curve: u16, x: &'a [u8], y: &'a [u8] },
}

struct ParsedPublicArea<'a> {
    name_alg: u16,
    key: PublicArea<'a>,
}

fn parse_pub_area(bytes: &[u8]) -> Result<ParsedPublicArea<'_>, Error> {
    let mut r = Reader(bytes);
    let ty = r.u16()?;
    let name_alg = r.u16()?;
    let _object_attributes = r.u32()?;
    let _auth_policy = r.sized()?;
    let key = match ty {
        TPM_ALG_RSA => {
            let _symmetric = r.u16()?;
            let _scheme = r.u16()?;
            let _key_bits = r.u16()?;
            let exponent = r.u32()?;
            let modulus = r.sized()?;
            PublicArea::Rsa { exponent, modulus }
        }
        TPM_ALG_ECC => {
            let _symmetric = r.u16()?;
            let _scheme = r.u16()?;
            let curve = r.u16()?;
            let _kdf = r.u16()?;
            let x = r.sized()?;
            let y = r.sized()?;
            PublicArea::Ecc { curve, x, y }
        }
        other => return Err(malformed(&format!("unsupported pubArea type {other:#06x}"))),
    };
    r.finish()?;
    Ok(ParsedPublicArea { name_alg, key })
}

/// The parts of a `TPMS_ATTEST` that are checked.
struct CertInfo<'a> {
    extra_data: &'a [u8],
    attested_name: &'a [u8],
}

fn parse_cert_info(bytes: &[u8]) -> Result<CertInfo<'_>, Error> {
    let mut r = Reader(bytes);
    if r.u32()? != TPM_GENERATED_VALUE {
        return Err(malformed("certInfo magic is not TPM_GENERATED_VALUE"));
    }
    if r.u16()? != TPM_ST_ATTEST_CERTIFY {
        return Err(malformed("certInfo type is not TPM_ST_ATTEST_CERTIFY"));
    }
    let _qualified_signer = r.sized()?;
    let extra_data = r.sized()?;
    // clock (8), resetCount (4), restartCount (4), safe (1)
    let _clock_info = r.take(17)?;
    let _firmware_version = r.take(8)?;
    let attested_name = r.sized()?;
    let _qualified_name = r.sized()?;
    r.finish()?;
    Ok(CertInfo {
        extra_data,
        attested_name,
    })
}

fn hash_for_name_alg(name_alg: u16, data: &[u8]) -> Result<Vec<u8>, Error> {
    match name_alg {
        TPM_ALG_SHA256 => Ok(sha256(data).to_vec()),
        TPM_ALG_SHA384 => Ok(sha384(data).to_vec()),
        TPM_ALG_SHA512 => Ok(sha512(data).to_vec()),
        other => Err(malformed(&format!("unsupported name algorithm {other:#06x}"))),
    }
}

fn hash_for_signature_alg(alg: iana::Algorithm, data: &[u8]) -> Result<Vec<u8>, Error> {
    match alg {
        iana::Algorithm::ES256 | iana::Algorithm::RS256 | iana::Algorithm::PS256 => {
            Ok(sha256(data).to_vec())
        }
        iana::Algorithm::ES384 | iana::Algorithm::RS384 => Ok(sha384(data).to_vec()),
        iana::Algorithm::ES512 | iana::Algorithm::RS512 => Ok(sha512(data).to_vec()),
        other => Err(Error::signature(format!("unsupported algorithm: {other:?}"))),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn matches_credential_key(area: &PublicArea<'_>, key: &CredentialPublicKey) -> bool {
    match (area, key) {
        (PublicArea::Rsa { exponent, modulus }, CredentialPublicKey::Rsa { n, e, .. }) => {
            // an exponent of zero stands for the default 65537
            let exponent = if *exponent == 0 { 65537 } else { *exponent };
            strip_leading_zeros(modulus) == strip_leading_zeros(n)
                && strip_leading_zeros(&exponent.to_be_bytes()) == strip_leading_zeros(e)
        }
        (
            PublicArea::Ecc { curve, x, y },
            CredentialPublicKey::Ec2 {
                curve: cose,
                x: cx,
                y: cy,
                ..
            },
        ) => {
            let same_curve = matches!(
                (*curve, cose),
                (TPM_ECC_NIST_P256, EcCurve::P256)
                    | (TPM_ECC_NIST_P384, EcCurve::P384)
                    | (TPM_ECC_NIST_P521, EcCurve::P521)
            );
            same_curve && *x == cx.as_slice() && *y == cy.as_slice()
        }
        _ => false,
    }
}

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    if statement.text("ver")? != "2.0" {
        return Err(malformed("version must be 2.0"));
    }
    let alg = statement.alg()?;
    let sig = statement.bytes("sig")?;
    let cert_info_raw = statement.bytes("certInfo")?;
    let pub_area_raw = statement.bytes("pubArea")?;
    if statement.stmt.get("ecdaaKeyId").is_some() {
        return Err(malformed("ECDAA is not supported"));
    }
    let chain = statement.x5c()?;

    let credential = statement.credential()?;
    let pub_area = parse_pub_area(pub_area_raw)?;
    if !matches_credential_key(&pub_area.key, &credential.credential_public_key) {
        return Err(malformed("pubArea does not match the credential key"));
    }

    let cert_info = parse_cert_info(cert_info_raw)?;
    if cert_info.extra_data != hash_for_signature_alg(alg, &statement.signed_data())? {
        return Err(malformed("extraData does not match the attested data"));
    }
    let (name_alg, name_digest) = cert_info
        .attested_name
        .split_first_chunk::<2>()
        .ok_or_else(|| malformed("attested name is truncated"))?;
    let name_alg = u16::from_be_bytes(*name_alg);
    if name_alg != pub_area.name_alg
        || name_digest != hash_for_name_alg(name_alg, pub_area_raw)?
    {
        return Err(malformed("attested name does not match pubArea"));
    }

    let aik = cert::parse(&chain[0])?;
    VerifyingKey::from_certificate(&aik)?.verify(alg, cert_info_raw, sig)?;

    if !cert::is_v3(&aik) {
        return Err(malformed("AIK certificate must be version 3"));
    }
    if !cert::has_empty_subject(&aik) {
        return Err(malformed("AIK certificate subject must be empty"));
    }
    if !cert::extended_key_usages(&aik)?.contains(&AIK_CERTIFICATE) {
        return Err(malformed("AIK certificate lacks the tcg-kp-AIKCertificate usage"));
    }
    if cert::is_ca(&aik)? {
        return Err(malformed("AIK certificate must not be a CA"));
    }
    cert::check_aaguid(&aik, &credential.aaguid)?;

    Ok((AttestationType::AttCa, chain))
}

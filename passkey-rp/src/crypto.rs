//! Signature verification for credential keys and certificate keys.

use coset::iana;
use p256::ecdsa::signature::Verifier;
use passkey_rp_types::cose::{CredentialPublicKey, EcCurve, OkpCurve};
use rsa::{pkcs1::DecodeRsaPublicKey, BigUint, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::{der::oid::ObjectIdentifier, Certificate};

use crate::Error;

#[cfg(test)]
mod tests;

const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Whether signatures made with `alg` can be verified.
pub fn is_supported(alg: iana::Algorithm) -> bool {
    matches!(
        alg,
        iana::Algorithm::ES256
            | iana::Algorithm::ES384
            | iana::Algorithm::EdDSA
            | iana::Algorithm::RS256
            | iana::Algorithm::RS384
            | iana::Algorithm::RS512
            | iana::Algorithm::PS256
    )
}

/// Encoding of an ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EcdsaEncoding {
    /// ASN.1 DER `SEQUENCE { r, s }`, used by WebAuthn and X.509.
    Der,
    /// Fixed width `r || s`, used by JWS.
    Fixed,
}

/// A public key that signatures can be checked against.
#[derive(Debug, Clone)]
pub(crate) enum VerifyingKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
    Rsa(RsaPublicKey),
}

impl VerifyingKey {
    /// Build a verifying key out of a decoded credential public key.
    pub fn from_credential_key(key: &CredentialPublicKey) -> Result<Self, Error> {
        let invalid = |e: &dyn std::fmt::Display| Error::signature(format!("invalid public key: {e}"));
        match key {
            CredentialPublicKey::Ec2 { curve, .. } => {
                let point = key
                    .uncompressed_point()
                    .ok_or_else(|| Error::signature("invalid public key: not an EC point"))?;
                match curve {
                    EcCurve::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                        .map(Self::P256)
                        .map_err(|e| invalid(&e)),
                    EcCurve::P384 => p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                        .map(Self::P384)
                        .map_err(|e| invalid(&e)),
                    EcCurve::P521 => Err(Error::signature("unsupported algorithm: P-521")),
                }
            }
            CredentialPublicKey::Okp {
                curve: OkpCurve::Ed25519,
                x,
                ..
            } => {
                let bytes: &[u8; 32] = x
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::signature("invalid public key: Ed25519 key length"))?;
                ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(&e))
            }
            CredentialPublicKey::Rsa { n, e, .. } => RsaPublicKey::new(
                BigUint::from_bytes_be(n),
                BigUint::from_bytes_be(e),
            )
            .map(Self::Rsa)
            .map_err(|e| invalid(&e)),
        }
    }

    /// Build a verifying key out of the subject public key of a certificate.
    pub fn from_certificate(cert: &Certificate) -> Result<Self, Error> {
        let spki = &cert.tbs_certificate.subject_public_key_info;
        let bytes = spki.subject_public_key.raw_bytes();
        let invalid =
            |e: &dyn std::fmt::Display| Error::malformed_attestation(format!("certificate key: {e}"));

        match spki.algorithm.oid {
            EC_PUBLIC_KEY => match bytes.len() {
                65 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map(Self::P256)
                    .map_err(|e| invalid(&e)),
                97 => p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                    .map(Self::P384)
                    .map_err(|e| invalid(&e)),
                len => Err(Error::malformed_attestation(format!(
                    "certificate key: unsupported EC point of {len} bytes"
                ))),
            },
            ED25519 => {
                let bytes: &[u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::malformed_attestation("certificate key: Ed25519 length"))?;
                ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(&e))
            }
            RSA_ENCRYPTION => RsaPublicKey::from_pkcs1_der(bytes)
                .map(Self::Rsa)
                .map_err(|e| invalid(&e)),
            oid => Err(Error::malformed_attestation(format!(
                "certificate key: unsupported algorithm {oid}"
            ))),
        }
    }

    /// Verify a WebAuthn signature, where ECDSA signatures are DER encoded.
    pub fn verify(&self, alg: iana::Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Error> {
        self.verify_with(alg, data, signature, EcdsaEncoding::Der)
    }

    /// Verify a signature, decoding ECDSA signatures with the given encoding.
    pub fn verify_with(
        &self,
        alg: iana::Algorithm,
        data: &[u8],
        signature: &[u8],
        encoding: EcdsaEncoding,
    ) -> Result<(), Error> {
        let bad = |e: &dyn std::fmt::Display| Error::signature(format!("signature invalid: {e}"));
        match (self, alg) {
            (Self::P256(key), iana::Algorithm::ES256) => {
                let sig = match encoding {
                    EcdsaEncoding::Der => p256::ecdsa::Signature::from_der(signature),
                    EcdsaEncoding::Fixed => p256::ecdsa::Signature::from_slice(signature),
                }
                .map_err(|e| bad(&e))?;
                key.verify(data, &sig).map_err(|e| bad(&e))
            }
            (Self::P384(key), iana::Algorithm::ES384) => {
                let sig = match encoding {
                    EcdsaEncoding::Der => p384::ecdsa::Signature::from_der(signature),
                    EcdsaEncoding::Fixed => p384::ecdsa::Signature::from_slice(signature),
                }
                .map_err(|e| bad(&e))?;
                key.verify(data, &sig).map_err(|e| bad(&e))
            }
            (Self::Ed25519(key), iana::Algorithm::EdDSA) => {
                let sig = ed25519_dalek::Signature::from_slice(signature).map_err(|e| bad(&e))?;
                key.verify(data, &sig).map_err(|e| bad(&e))
            }
            (Self::Rsa(key), iana::Algorithm::RS256) => {
                verify_pkcs1v15::<Sha256>(key, data, signature)
            }
            (Self::Rsa(key), iana::Algorithm::RS384) => {
                verify_pkcs1v15::<Sha384>(key, data, signature)
            }
            (Self::Rsa(key), iana::Algorithm::RS512) => {
                verify_pkcs1v15::<Sha512>(key, data, signature)
            }
            (Self::Rsa(key), iana::Algorithm::PS256) => {
                let sig = rsa::pss::Signature::try_from(signature).map_err(|e| bad(&e))?;
                rsa::pss::VerifyingKey::<Sha256>::new(key.clone())
                    .verify(data, &sig)
                    .map_err(|e| bad(&e))
            }
            (_, alg) if !is_supported(alg) => Err(Error::signature(format!(
                "unsupported algorithm: {alg:?}"
            ))),
            (key, alg) => Err(Error::signature(format!(
                "algorithm {alg:?} does not match the {} key",
                key.name()
            ))),
        }
    }

    /// Verify the signature an issuer placed on `cert`.
    pub fn verify_certificate(&self, cert: &Certificate) -> Result<(), Error> {
        use x509_cert::der::Encode;

        let alg = match cert.signature_algorithm.oid {
            ECDSA_WITH_SHA256 => iana::Algorithm::ES256,
            ECDSA_WITH_SHA384 => iana::Algorithm::ES384,
            SHA256_WITH_RSA => iana::Algorithm::RS256,
            SHA384_WITH_RSA => iana::Algorithm::RS384,
            SHA512_WITH_RSA => iana::Algorithm::RS512,
            ED25519 => iana::Algorithm::EdDSA,
            oid => {
                return Err(Error::untrusted(format!(
                    "unsupported certificate signature algorithm {oid}"
                )))
            }
        };
        let tbs = cert
            .tbs_certificate
            .to_der()
            .map_err(|e| Error::malformed_attestation(format!("certificate: {e}")))?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| Error::malformed_attestation("certificate signature has unused bits"))?;
        self.verify(alg, &tbs, signature)
    }

    /// Whether this key and the credential public key are the same key.
    pub fn matches(&self, key: &CredentialPublicKey) -> bool {
        match (self, Self::from_credential_key(key)) {
            (Self::P256(a), Ok(Self::P256(b))) => a == &b,
            (Self::P384(a), Ok(Self::P384(b))) => a == &b,
            (Self::Ed25519(a), Ok(Self::Ed25519(b))) => a == &b,
            (Self::Rsa(a), Ok(Self::Rsa(b))) => a == &b,
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::P256(_) => "P-256",
            Self::P384(_) => "P-384",
            Self::Ed25519(_) => "Ed25519",
            Self::Rsa(_) => "RSA",
        }
    }
}

fn verify_pkcs1v15<D>(key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<(), Error>
where
    D: sha2::Digest + x509_cert::der::oid::AssociatedOid,
{
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| Error::signature(format!("signature invalid: {e}")))?;
    rsa::pkcs1v15::VerifyingKey::<D>::new(key.clone())
        .verify(data, &sig)
        .map_err(|e| Error::signature(format!("signature invalid: {e}")))
}

/// Verify `signature` over `data` with a credential public key, using the key's own algorithm.
pub fn verify_signature(
    key: &CredentialPublicKey,
    data: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    if !is_supported(key.alg()) {
        return Err(Error::signature(format!(
            "unsupported algorithm: {:?}",
            key.alg()
        )));
    }
    VerifyingKey::from_credential_key(key)?.verify(key.alg(), data, signature)
}

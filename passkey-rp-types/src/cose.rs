//! Decoding of credential public keys from their [COSE_Key] representation.
//!
//! [COSE_Key]: https://www.rfc-editor.org/rfc/rfc9052#section-7

use ciborium::value::Value;
use coset::{
    iana::{self, EnumI64},
    Algorithm, CborSerializable, CoseKey, KeyType, Label, RegisteredLabelWithPrivate,
};
use serde::{Deserialize, Serialize};

use crate::CodecError;

/// The NIST curves accepted for [`CredentialPublicKey::Ec2`] keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcCurve {
    /// secp256r1
    P256,
    /// secp384r1
    P384,
    /// secp521r1
    P521,
}

impl EcCurve {
    /// Length in bytes of a single affine coordinate.
    pub fn coordinate_len(&self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }

    fn to_iana(self) -> iana::EllipticCurve {
        match self {
            EcCurve::P256 => iana::EllipticCurve::P_256,
            EcCurve::P384 => iana::EllipticCurve::P_384,
            EcCurve::P521 => iana::EllipticCurve::P_521,
        }
    }
}

/// The Edwards curves accepted for [`CredentialPublicKey::Okp`] keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OkpCurve {
    /// Ed25519, used with EdDSA
    Ed25519,
}

/// A credential public key decoded from the COSE_Key found in the attested credential data.
///
/// Only the parameters needed for signature verification are retained. The key serializes back
/// to its COSE encoding so that it can be persisted as an opaque byte string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPublicKey {
    /// An elliptic curve key with both affine coordinates.
    Ec2 {
        /// The algorithm the key is bound to, e.g. ES256.
        alg: iana::Algorithm,
        /// Which NIST curve the point lies on.
        curve: EcCurve,
        /// Big-endian X coordinate.
        x: Vec<u8>,
        /// Big-endian Y coordinate.
        y: Vec<u8>,
    },
    /// An RSA public key.
    Rsa {
        /// The algorithm the key is bound to, e.g. RS256.
        alg: iana::Algorithm,
        /// Big-endian modulus.
        n: Vec<u8>,
        /// Big-endian public exponent.
        e: Vec<u8>,
    },
    /// An octet key pair, i.e. an Ed25519 key.
    Okp {
        /// Always EdDSA in practice.
        alg: iana::Algorithm,
        /// The Edwards curve of the key.
        curve: OkpCurve,
        /// The encoded public point.
        x: Vec<u8>,
    },
}

fn param<'a>(key: &'a CoseKey, label: i64) -> Option<&'a Value> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .map(|(_, v)| v)
}

fn bytes_param(key: &CoseKey, label: i64, name: &str) -> Result<Vec<u8>, CodecError> {
    param(key, label)
        .and_then(Value::as_bytes)
        .cloned()
        .ok_or_else(|| CodecError::MalformedCoseKey(format!("missing or invalid `{name}`")))
}

fn curve_param(key: &CoseKey) -> Result<i64, CodecError> {
    param(key, iana::Ec2KeyParameter::Crv.to_i64())
        .and_then(Value::as_integer)
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| CodecError::MalformedCoseKey("missing or invalid `crv`".into()))
}

impl CredentialPublicKey {
    /// Decode a credential public key from its CBOR encoded COSE_Key.
    pub fn from_cose(bytes: &[u8]) -> Result<Self, CodecError> {
        let key = CoseKey::from_slice(bytes)
            .map_err(|e| CodecError::MalformedCoseKey(e.to_string()))?;
        Self::from_cose_key(&key)
    }

    /// Convert an already parsed [`CoseKey`].
    ///
    /// Fails with [`CodecError::UnsupportedKeyType`] for any key type or curve outside of EC2
    /// P-256/P-384/P-521, RSA and OKP Ed25519.
    pub fn from_cose_key(key: &CoseKey) -> Result<Self, CodecError> {
        let alg = match &key.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => *alg,
            Some(other) => {
                return Err(CodecError::MalformedCoseKey(format!(
                    "unregistered algorithm {other:?}"
                )))
            }
            None => return Err(CodecError::MalformedCoseKey("missing `alg`".into())),
        };

        match key.kty {
            KeyType::Assigned(iana::KeyType::EC2) => {
                let curve = match iana::EllipticCurve::from_i64(curve_param(key)?) {
                    Some(iana::EllipticCurve::P_256) => EcCurve::P256,
                    Some(iana::EllipticCurve::P_384) => EcCurve::P384,
                    Some(iana::EllipticCurve::P_521) => EcCurve::P521,
                    other => {
                        return Err(CodecError::UnsupportedKeyType(format!(
                            "EC2 curve {other:?}"
                        )))
                    }
                };
                let x = bytes_param(key, iana::Ec2KeyParameter::X.to_i64(), "x")?;
                let y = bytes_param(key, iana::Ec2KeyParameter::Y.to_i64(), "y")?;
                if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
                    return Err(CodecError::MalformedCoseKey(format!(
                        "coordinates of {:?} must be {} bytes",
                        curve,
                        curve.coordinate_len()
                    )));
                }
                Ok(CredentialPublicKey::Ec2 { alg, curve, x, y })
            }
            KeyType::Assigned(iana::KeyType::RSA) => {
                let n = bytes_param(key, iana::RsaKeyParameter::N.to_i64(), "n")?;
                let e = bytes_param(key, iana::RsaKeyParameter::E.to_i64(), "e")?;
                if n.is_empty() || e.is_empty() {
                    return Err(CodecError::MalformedCoseKey("empty RSA parameter".into()));
                }
                Ok(CredentialPublicKey::Rsa { alg, n, e })
            }
            KeyType::Assigned(iana::KeyType::OKP) => {
                match iana::EllipticCurve::from_i64(curve_param(key)?) {
                    Some(iana::EllipticCurve::Ed25519) => {}
                    other => {
                        return Err(CodecError::UnsupportedKeyType(format!(
                            "OKP curve {other:?}"
                        )))
                    }
                }
                let x = bytes_param(key, iana::OkpKeyParameter::X.to_i64(), "x")?;
                if x.len() != 32 {
                    return Err(CodecError::MalformedCoseKey(
                        "Ed25519 keys must be 32 bytes".into(),
                    ));
                }
                Ok(CredentialPublicKey::Okp {
                    alg,
                    curve: OkpCurve::Ed25519,
                    x,
                })
            }
            ref other => Err(CodecError::UnsupportedKeyType(format!("{other:?}"))),
        }
    }

    /// The COSE algorithm identifier this key is bound to.
    pub fn alg(&self) -> iana::Algorithm {
        match self {
            CredentialPublicKey::Ec2 { alg, .. }
            | CredentialPublicKey::Rsa { alg, .. }
            | CredentialPublicKey::Okp { alg, .. } => *alg,
        }
    }

    /// The SEC1 uncompressed point `0x04 || x || y` for EC2 keys.
    pub fn uncompressed_point(&self) -> Option<Vec<u8>> {
        match self {
            CredentialPublicKey::Ec2 { x, y, .. } => Some(
                std::iter::once(0x04)
                    .chain(x.iter().copied())
                    .chain(y.iter().copied())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Rebuild the [`CoseKey`] representation of this key.
    pub fn to_cose_key(&self) -> CoseKey {
        let int = |i: i64| Label::Int(i);
        let (kty, alg, params) = match self {
            CredentialPublicKey::Ec2 { alg, curve, x, y } => (
                iana::KeyType::EC2,
                alg,
                vec![
                    (
                        int(iana::Ec2KeyParameter::Crv.to_i64()),
                        Value::from(curve.to_iana().to_i64()),
                    ),
                    (int(iana::Ec2KeyParameter::X.to_i64()), Value::Bytes(x.clone())),
                    (int(iana::Ec2KeyParameter::Y.to_i64()), Value::Bytes(y.clone())),
                ],
            ),
            CredentialPublicKey::Rsa { alg, n, e } => (
                iana::KeyType::RSA,
                alg,
                vec![
                    (int(iana::RsaKeyParameter::N.to_i64()), Value::Bytes(n.clone())),
                    (int(iana::RsaKeyParameter::E.to_i64()), Value::Bytes(e.clone())),
                ],
            ),
            CredentialPublicKey::Okp { alg, x, .. } => (
                iana::KeyType::OKP,
                alg,
                vec![
                    (
                        int(iana::OkpKeyParameter::Crv.to_i64()),
                        Value::from(iana::EllipticCurve::Ed25519.to_i64()),
                    ),
                    (int(iana::OkpKeyParameter::X.to_i64()), Value::Bytes(x.clone())),
                ],
            ),
        };
        CoseKey {
            kty: KeyType::Assigned(kty),
            alg: Some(Algorithm::Assigned(*alg)),
            params,
            ..Default::default()
        }
    }

    /// Encode this key to its CBOR COSE_Key bytes.
    pub fn to_cose(&self) -> Result<Vec<u8>, CodecError> {
        self.to_cose_key()
            .to_vec()
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }
}

impl Serialize for CredentialPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let bytes = self.to_cose().map_err(serde::ser::Error::custom)?;
        crate::Bytes::from(bytes).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CredentialPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = crate::Bytes::deserialize(deserializer)?;
        CredentialPublicKey::from_cose(&bytes).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests;

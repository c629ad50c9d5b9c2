use std::io::Cursor;

use ciborium::value::Value;

use crate::{authenticator::AuthenticatorData, CodecError};

/// The attestation object returned by `navigator.credentials.create()`.
///
/// It is a CBOR map of exactly three entries: the attestation statement format identifier, the
/// attestation statement whose syntax depends on that format, and the raw authenticator data.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    /// The attestation statement format identifier, e.g. `"packed"`.
    pub fmt: String,

    /// The format specific attestation statement.
    pub att_stmt: AttestationStatement,

    /// The raw authenticator data. The raw form is kept since signatures are computed over it.
    pub auth_data: Vec<u8>,
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedAttestation(reason.into())
}

/// Decode an attestation object from its CBOR bytes.
///
/// Shorthand for [`AttestationObject::from_slice`].
pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject, CodecError> {
    AttestationObject::from_slice(bytes)
}

impl AttestationObject {
    /// Decode an attestation object from its CBOR bytes.
    ///
    /// Any other top level key, a missing key, trailing data or truncation results in
    /// [`CodecError::MalformedAttestation`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Cursor::new(bytes);
        let value: Value =
            ciborium::de::from_reader(&mut reader).map_err(|e| malformed(e.to_string()))?;
        if usize::try_from(reader.position()).ok() != Some(bytes.len()) {
            return Err(malformed("trailing bytes after the attestation object"));
        }

        let Value::Map(entries) = value else {
            return Err(malformed("top level is not a map"));
        };

        let mut fmt = None;
        let mut att_stmt = None;
        let mut auth_data = None;
        for (key, value) in entries {
            match (key.as_text(), value) {
                (Some("fmt"), Value::Text(text)) => fmt = Some(text),
                (Some("attStmt"), Value::Map(map)) => att_stmt = Some(AttestationStatement(map)),
                (Some("authData"), Value::Bytes(data)) => auth_data = Some(data),
                (Some(key @ ("fmt" | "attStmt" | "authData")), _) => {
                    return Err(malformed(format!("`{key}` has the wrong type")))
                }
                (key, _) => return Err(malformed(format!("unexpected key {key:?}"))),
            }
        }

        Ok(Self {
            fmt: fmt.ok_or_else(|| malformed("missing `fmt`"))?,
            att_stmt: att_stmt.ok_or_else(|| malformed("missing `attStmt`"))?,
            auth_data: auth_data.ok_or_else(|| malformed("missing `authData`"))?,
        })
    }

    /// Decode the embedded authenticator data.
    pub fn authenticator_data(&self) -> Result<AuthenticatorData, CodecError> {
        AuthenticatorData::from_slice(&self.auth_data)
    }

    /// Encode this attestation object to CBOR.
    pub fn to_vec(&self) -> Result<Vec<u8>, CodecError> {
        let value = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text(self.fmt.clone())),
            (
                Value::Text("attStmt".into()),
                Value::Map(self.att_stmt.0.clone()),
            ),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.auth_data.clone()),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&value, &mut bytes)
            .map_err(|e| CodecError::Encoding(e.to_string()))?;
        Ok(bytes)
    }
}

/// A format specific attestation statement, a CBOR map keyed by text strings.
///
/// The accessors return `None` when the entry is absent or does not have the requested type,
/// leaving it to each format verifier to decide which entries are mandatory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttestationStatement(pub Vec<(Value, Value)>);

impl AttestationStatement {
    /// Whether the statement has no entries, as required by the `none` format.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw access to an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// A byte string entry such as `sig`.
    pub fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key)?.as_bytes().map(Vec::as_slice)
    }

    /// A text entry such as `ver`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_text()
    }

    /// An integer entry such as `alg`.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key)?
            .as_integer()
            .and_then(|i| i64::try_from(i).ok())
    }

    /// The `x5c` certificate chain, leaf first.
    ///
    /// Returns `Some(Err(_))` when the entry exists but is not a non-empty array of byte strings.
    pub fn x5c(&self) -> Option<Result<Vec<Vec<u8>>, CodecError>> {
        let value = self.get("x5c")?;
        let chain = value
            .as_array()
            .ok_or_else(|| malformed("`x5c` is not an array"))
            .and_then(|array| {
                array
                    .iter()
                    .map(|cert| {
                        cert.as_bytes()
                            .cloned()
                            .ok_or_else(|| malformed("`x5c` entry is not a byte string"))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .and_then(|chain| {
                if chain.is_empty() {
                    Err(malformed("`x5c` is empty"))
                } else {
                    Ok(chain)
                }
            });
        Some(chain)
    }
}

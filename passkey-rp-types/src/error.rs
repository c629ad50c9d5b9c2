/// Failures of the binary codec layer.
///
/// Every variant carries a short description of which part of the structure was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The attestation object is not a CBOR map with `fmt`, `attStmt` and `authData`, or is truncated.
    #[error("malformed attestation object: {0}")]
    MalformedAttestation(String),

    /// The authenticator data length does not agree with its flags.
    #[error("malformed authenticator data: {0}")]
    MalformedAuthenticatorData(String),

    /// The COSE key uses a key type or curve which is not supported.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The COSE key is of a supported type but is missing parameters or has invalid ones.
    #[error("malformed COSE key: {0}")]
    MalformedCoseKey(String),

    /// A structure could not be encoded back to CBOR.
    #[error("encoding failed: {0}")]
    Encoding(String),
}

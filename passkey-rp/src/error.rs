use passkey_rp_types::CodecError;
use serde::Serialize;

use crate::credential_store::StoreError;

/// The reason a ceremony was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr)]
pub enum ErrorKind {
    /// The JSON or CBOR sent by the client could not be parsed or violates the expected shape.
    MalformedInput,
    /// The attestation object or one of its statements is malformed.
    MalformedAttestation,
    /// The authenticator data length does not agree with its flags.
    MalformedAuthenticatorData,
    /// The credential public key uses an unsupported key type or curve.
    UnsupportedKeyType,
    /// The challenge in the client data is not the one that was issued.
    ChallengeMismatch,
    /// The client data origin is not in the configured allow-list.
    OriginNotAllowed,
    /// The authenticator data is scoped to a different RP ID.
    RpIdMismatch,
    /// The attestation statement format is not supported.
    UnsupportedAttestationFormat,
    /// A signature did not verify, or uses an algorithm that cannot be verified.
    SignatureInvalid,
    /// The attestation chain does not lead to a trusted root, or the authenticator is compromised.
    AttestationNotTrusted,
    /// The credential id is already registered.
    DuplicateCredential,
    /// The signature counter did not increase, the authenticator may have been cloned.
    PossibleCloning,
    /// The returned user handle does not own the credential.
    UserHandleMismatch,
    /// The user presence flag is not set.
    UserPresenceRequired,
    /// User verification was required but the user verified flag is not set.
    UserVerificationRequired,
    /// The backup eligibility or backup state flags violate the configured policy.
    BackupPolicyViolation,
    /// The ceremony options expired, were already consumed, or never existed.
    OptionsExpired,
    /// No metadata is available for the authenticator and the policy requires it.
    MetadataUnavailable,
    /// The credential used for the assertion is not known.
    CredentialNotFound,
    /// The user named in the request is not registered.
    UserNotFound,
    /// The credential store failed.
    Store,
}

/// A rejected ceremony: the [`ErrorKind`] plus a human readable detail for logs.
///
/// The detail explains which check failed and must not be shown to end users, use
/// [`Error::public_message`] for that.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct Error {
    kind: ErrorKind,
    detail: String,
}

impl Error {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Which check failed.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Details about the failure, meant for logs.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// A message that does not reveal which check failed, so that it cannot be used to
    /// enumerate users or credentials.
    pub fn public_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::OptionsExpired => "The request has expired, please try again.",
            ErrorKind::Store => "The service is temporarily unavailable.",
            _ => "The passkey could not be verified.",
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedInput, detail)
    }

    pub(crate) fn malformed_attestation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedAttestation, detail)
    }

    pub(crate) fn signature(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SignatureInvalid, detail)
    }

    pub(crate) fn untrusted(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttestationNotTrusted, detail)
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        let kind = match err {
            CodecError::MalformedAttestation(_) => ErrorKind::MalformedAttestation,
            CodecError::MalformedAuthenticatorData(_) => ErrorKind::MalformedAuthenticatorData,
            CodecError::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            CodecError::MalformedCoseKey(_) | CodecError::Encoding(_) => ErrorKind::MalformedInput,
        };
        Error::new(kind, err.to_string())
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        let kind = match err {
            StoreError::DuplicateCredential => ErrorKind::DuplicateCredential,
            StoreError::NotFound => ErrorKind::CredentialNotFound,
            StoreError::Conflict | StoreError::Backend(_) => ErrorKind::Store,
        };
        Error::new(kind, err.to_string())
    }
}

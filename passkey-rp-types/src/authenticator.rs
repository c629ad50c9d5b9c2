//! Binary structures produced by authenticators: the [`AuthenticatorData`], the
//! [`AttestationObject`] that wraps it at registration, and their building blocks.

mod aaguid;
mod attestation_object;
mod authenticator_data;
mod flags;

pub use self::{
    aaguid::Aaguid,
    attestation_object::{decode_attestation_object, AttestationObject, AttestationStatement},
    authenticator_data::{AttestedCredentialData, AuthenticatorData, MAX_CREDENTIAL_ID_LEN},
    flags::Flags,
};

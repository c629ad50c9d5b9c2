//! # Passkey RP Types
//!
//! Rust type definitions for the relying party side of the [WebAuthn Level 3] specification.
//!
//! This covers the JSON shapes exchanged with `navigator.credentials.create()` and
//! `navigator.credentials.get()`, as well as the binary structures carried inside of them:
//! [authenticator data](authenticator::AuthenticatorData),
//! [attestation objects](authenticator::AttestationObject) and
//! [COSE public keys](cose::CredentialPublicKey).
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

mod error;
mod utils;

pub mod authenticator;
pub mod cose;
pub mod webauthn;

// Re-exports
pub use error::CodecError;
pub use utils::{
    bytes::{Bytes, NotBase64Encoded},
    crypto, encoding, rand,
};

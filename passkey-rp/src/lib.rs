//! # Passkey RP
//!
//! [![github]](https://github.com/1Password/passkey-rs/tree/main/passkey-rp)
//! [![version]](https://crates.io/crates/passkey-rp)
//! [![documentation]](https://docs.rs/passkey-rp/)
//!
//! This crate implements the relying party side of the [Webauthn] specification: issuing
//! creation and request options, then verifying what the browser sends back.
//!
//! [`RelyingParty`] performs the ceremonies without holding any state of its own. The begin
//! operations return a state value that is handed back to the finish operations. Attestation
//! statements of the `none`, `packed`, `fido-u2f`, `android-safetynet`, `tpm` and `apple` formats
//! are verified, and their certificate chains can be anchored with authenticator metadata from a
//! [`MetadataProvider`](metadata::MetadataProvider).
//!
//! [`PasskeyServer`] combines a [`RelyingParty`] with a [`CredentialStore`] and a table of
//! pending ceremonies, leaving only the transport to the application.
//!
//! This crate does not provide an HTTP server.
//!
//! [github]: https://img.shields.io/badge/GitHub-1Password%2Fpasskey--rs%2Fpasskey--rp-informational?logo=github&style=flat
//! [version]: https://img.shields.io/crates/v/passkey-rp?logo=rust&style=flat
//! [documentation]: https://img.shields.io/docsrs/passkey-rp/latest?logo=docs.rs&style=flat
//! [Webauthn]: https://w3c.github.io/webauthn/

mod cert;
mod client_data;
mod error;
mod jws;
mod relying_party;
mod server;

pub mod attestation;
pub mod config;
pub mod credential_store;
pub mod crypto;
pub mod device_public_key;
pub mod metadata;
pub mod pending;
pub mod state;

#[cfg(test)]
mod testing;

pub use passkey_rp_types as types;

pub use self::{
    config::{ConfigError, RelyingPartyConfig},
    credential_store::{CredentialStore, MemoryStore, StoreError},
    error::{Error, ErrorKind},
    pending::{CeremonyToken, PendingCeremonies},
    relying_party::{AssertionResult, CredentialOwnership, RegistrationResult, RelyingParty},
    server::{AssertionOutcome, PasskeyServer, RegistrationOutcome},
};

#[cfg(any(test, feature = "testable"))]
pub use self::relying_party::MockCredentialOwnership;

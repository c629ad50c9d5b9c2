use std::io::{Cursor, Read};

use ciborium::value::Value;
use coset::{AsCborValue, CoseKey};
use serde::{Deserialize, Serialize};

use crate::{
    authenticator::{Aaguid, Flags},
    cose::CredentialPublicKey,
    crypto::sha256,
    CodecError,
};

/// Fixed size prefix: rpIdHash (32 bytes) + flags (1 byte) + signCount (4 bytes).
const FIXED_LEN: usize = 37;

/// Longest credential ID a relying party should accept.
///
/// <https://w3c.github.io/webauthn/#credential-id>
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// The authenticator data structure encodes contextual bindings made by the authenticator.
///
/// The relying party receives it inside the attestation object at registration and as a separate
/// field of the assertion response at authentication. It is the data the credential signature
/// covers, together with the hash of the client data.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    /// SHA-256 hash of the RP ID the credential is scoped to.
    rp_id_hash: [u8; 32],

    /// The flags representing the information of this credential. See [Flags] for more information.
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer. `0` when the authenticator does not
    /// implement a counter.
    pub counter: u32,

    /// Present when [`Flags::AT`] is set.
    pub attested_credential_data: Option<AttestedCredentialData>,

    /// Extension-defined authenticator data, a CBOR map. Present when [`Flags::ED`] is set.
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Create a new AuthenticatorData object for an RP ID and a counter, with no flags set.
    pub fn new(rp_id: &str, counter: u32) -> Self {
        Self {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: Flags::empty(),
            counter,
            attested_credential_data: None,
            extensions: None,
        }
    }

    /// Add an [`AttestedCredentialData`] to the authenticator data.
    ///
    /// This sets the [`Flags::AT`] value as well.
    pub fn set_attested_credential_data(mut self, acd: AttestedCredentialData) -> Self {
        self.attested_credential_data = Some(acd);
        self.set_flags(Flags::AT)
    }

    /// Set additional [`Flags`] to the authenticator data.
    pub fn set_flags(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    /// Look up an authenticator extension output by its identifier.
    pub fn extension(&self, id: &str) -> Option<&Value> {
        self.extensions
            .as_ref()?
            .as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(id))
            .map(|(_, v)| v)
    }
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedAuthenticatorData(reason.into())
}

impl AuthenticatorData {
    /// Decode an Authenticator data from a byte slice.
    ///
    /// The length of the input must agree exactly with what the flags announce: attested
    /// credential data when [`Flags::AT`] is set, an extension map when [`Flags::ED`] is set and
    /// nothing else after that.
    pub fn from_slice(v: &[u8]) -> Result<Self, CodecError> {
        if v.len() < FIXED_LEN {
            return Err(malformed(format!(
                "expected at least {FIXED_LEN} bytes, got {}",
                v.len()
            )));
        }

        let (rp_id_hash, rest) = v.split_at(32);
        let (flag_byte, rest) = rest.split_at(1);
        let (counter, rest) = rest.split_at(4);

        let rp_id_hash: [u8; 32] = rp_id_hash
            .try_into()
            .map_err(|_| malformed("rpIdHash is not 32 bytes"))?;
        let counter: [u8; 4] = counter
            .try_into()
            .map_err(|_| malformed("signCount is not 4 bytes"))?;
        let flags = Flags::from(flag_byte[0]);

        let mut reader = Cursor::new(rest);
        let attested_credential_data = flags
            .contains(Flags::AT)
            .then(|| AttestedCredentialData::from_reader(&mut reader))
            .transpose()?;
        let extensions = flags
            .contains(Flags::ED)
            .then(|| {
                let value: Value = ciborium::de::from_reader(&mut reader)
                    .map_err(|e| malformed(format!("extensions: {e}")))?;
                if value.is_map() {
                    Ok(value)
                } else {
                    Err(malformed("extensions are not a CBOR map"))
                }
            })
            .transpose()?;

        let consumed = usize::try_from(reader.position())
            .map_err(|_| malformed("authenticator data is too large"))?;
        if consumed != rest.len() {
            return Err(malformed(format!(
                "{} unexpected trailing bytes",
                rest.len() - consumed
            )));
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter: u32::from_be_bytes(counter),
            attested_credential_data,
            extensions,
        })
    }

    /// Encode an authenticator data to its byte representation.
    pub fn to_vec(&self) -> Result<Vec<u8>, CodecError> {
        let mut flags = self.flags;
        flags.set(Flags::AT, self.attested_credential_data.is_some());
        flags.set(Flags::ED, self.extensions.is_some());

        let mut bytes = Vec::with_capacity(FIXED_LEN);
        bytes.extend_from_slice(&self.rp_id_hash);
        bytes.push(flags.into());
        bytes.extend_from_slice(&self.counter.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            acd.write_to(&mut bytes)?;
        }
        if let Some(extensions) = &self.extensions {
            ciborium::ser::into_writer(extensions, &mut bytes)
                .map_err(|e| CodecError::Encoding(e.to_string()))?;
        }
        Ok(bytes)
    }
}

impl Serialize for AuthenticatorData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let bytes = self.to_vec().map_err(serde::ser::Error::custom)?;
        crate::Bytes::from(bytes).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AuthenticatorData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = crate::Bytes::deserialize(deserializer)?;
        AuthenticatorData::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Attested credential data is a variable-length byte array added to the authenticator data when
/// generating an attestation object for a credential
///
/// <https://w3c.github.io/webauthn/#attested-credential-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    /// The credential ID whose length is prepended to the byte array. This is not public as it
    /// should not be modifiable to be longer than a u16.
    credential_id: Vec<u8>,

    /// The credential public key, decoded from its COSE_Key encoding.
    pub credential_public_key: CredentialPublicKey,
}

impl AttestedCredentialData {
    /// Create a new [AttestedCredentialData]
    ///
    /// # Error
    /// Returns an error if the length of `credential_id` cannot be represented by a u16.
    pub fn new(
        aaguid: Aaguid,
        credential_id: Vec<u8>,
        credential_public_key: CredentialPublicKey,
    ) -> Result<Self, CodecError> {
        u16::try_from(credential_id.len())
            .map_err(|_| malformed("credential id longer than u16::MAX"))?;

        Ok(Self {
            aaguid,
            credential_id,
            credential_public_key,
        })
    }

    /// Get read access to the credential ID,
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    fn write_to(&self, bytes: &mut Vec<u8>) -> Result<(), CodecError> {
        let len = u16::try_from(self.credential_id.len())
            .map_err(|_| malformed("credential id longer than u16::MAX"))?;
        bytes.extend_from_slice(&self.aaguid.0);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&self.credential_id);
        bytes.extend(self.credential_public_key.to_cose()?);
        Ok(())
    }

    fn from_reader<R: Read>(reader: &mut R) -> Result<Self, CodecError> {
        let mut aaguid = [0; 16];
        reader
            .read_exact(&mut aaguid)
            .map_err(|_| malformed("attested credential data is missing the AAGUID"))?;

        let mut cred_len = [0; 2];
        reader
            .read_exact(&mut cred_len)
            .map_err(|_| malformed("attested credential data is missing the id length"))?;
        let cred_len = usize::from(u16::from_be_bytes(cred_len));

        let mut credential_id = vec![0; cred_len];
        reader
            .read_exact(&mut credential_id)
            .map_err(|_| malformed("credential id is truncated"))?;

        let cose_val: Value = ciborium::de::from_reader(reader)
            .map_err(|e| malformed(format!("credential public key: {e}")))?;
        let cose_key = <CoseKey as AsCborValue>::from_cbor_value(cose_val)
            .map_err(|e| CodecError::MalformedCoseKey(e.to_string()))?;
        let credential_public_key = CredentialPublicKey::from_cose_key(&cose_key)?;

        Ok(Self {
            aaguid: Aaguid(aaguid),
            credential_id,
            credential_public_key,
        })
    }
}

//! A software authenticator and certificate factory for the test suites.

use std::{str::FromStr, time::Duration};

use ciborium::{cbor, Value};
use coset::iana;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use passkey_rp_types::{
    authenticator::{
        Aaguid, AttestationObject, AttestationStatement, AttestedCredentialData,
        AuthenticatorData, Flags,
    },
    cose::{CredentialPublicKey, EcCurve},
    crypto::sha256,
    encoding,
    rand::random_vec,
    webauthn::{
        AuthenticatedPublicKeyCredential, AuthenticationExtensionsClientOutputs,
        AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, AuthenticatorTransport,
        CreatedPublicKeyCredential, PublicKeyCredential, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialRequestOptions, PublicKeyCredentialType,
    },
};
use x509_cert::{
    certificate::{TbsCertificate, Version},
    der::{
        asn1::{BitString, OctetString},
        oid::ObjectIdentifier,
        Encode,
    },
    ext::{pkix::BasicConstraints, Extension},
    name::{Name, RdnSequence},
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    time::Validity,
    Certificate,
};

pub(crate) const ORIGIN: &str = "https://example.com";
pub(crate) const RP_ID: &str = "example.com";

/// A P-256 key pair.
#[derive(Clone)]
pub(crate) struct TestKey(SigningKey);

impl TestKey {
    pub fn random() -> Self {
        Self(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Uncompressed SEC1 point.
    pub fn point(&self) -> Vec<u8> {
        self.0
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn credential_key(&self) -> CredentialPublicKey {
        let point = self.point();
        CredentialPublicKey::Ec2 {
            alg: iana::Algorithm::ES256,
            curve: EcCurve::P256,
            x: point[1..33].to_vec(),
            y: point[33..].to_vec(),
        }
    }

    /// DER encoded ES256 signature.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.0.sign(data);
        signature.to_der().as_bytes().to_vec()
    }

    /// Fixed width `r || s` signature, as used by JWS.
    pub fn sign_fixed(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.0.sign(data);
        signature.to_bytes().to_vec()
    }
}

pub(crate) fn extension(oid: &str, value: Vec<u8>) -> Extension {
    Extension {
        extn_id: ObjectIdentifier::new_unwrap(oid),
        critical: false,
        extn_value: OctetString::new(value).expect("extension value"),
    }
}

pub(crate) fn aaguid_extension(aaguid: Aaguid) -> Extension {
    let value = OctetString::new(aaguid.0.to_vec())
        .and_then(|octets| octets.to_der())
        .expect("aaguid extension");
    extension("1.3.6.1.4.1.45724.1.1.4", value)
}

pub(crate) fn basic_constraints(ca: bool) -> Extension {
    let value = BasicConstraints {
        ca,
        path_len_constraint: None,
    }
    .to_der()
    .expect("basic constraints");
    extension("2.5.29.19", value)
}

/// Build a DER certificate for `subject_key`, signed with ES256 by `issuer_key`.
///
/// An empty subject produces an empty distinguished name.
pub(crate) fn certificate(
    subject: &str,
    subject_key: &TestKey,
    issuer: &str,
    issuer_key: &TestKey,
    extensions: Vec<Extension>,
) -> Vec<u8> {
    let name = |dn: &str| {
        if dn.is_empty() {
            RdnSequence(Vec::new())
        } else {
            Name::from_str(dn).expect("distinguished name")
        }
    };
    let signature_algorithm = AlgorithmIdentifierOwned {
        oid: ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2"),
        parameters: None,
    };
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[0x01, 0x42]).expect("serial number"),
        signature: signature_algorithm.clone(),
        issuer: name(issuer),
        validity: Validity::from_now(Duration::from_secs(3600)).expect("validity"),
        subject: name(subject),
        subject_public_key_info: SubjectPublicKeyInfoOwned {
            algorithm: AlgorithmIdentifierOwned {
                oid: ObjectIdentifier::new_unwrap("1.2.840.10045.2.1"),
                parameters: None,
            },
            subject_public_key: BitString::from_bytes(&subject_key.point()).expect("key"),
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: (!extensions.is_empty()).then_some(extensions),
    };
    let signature = issuer_key.sign(&tbs_certificate.to_der().expect("tbs certificate"));
    Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).expect("signature"),
    }
    .to_der()
    .expect("certificate")
}

/// A root certificate and its key.
pub(crate) struct TestCa {
    pub key: TestKey,
    pub der: Vec<u8>,
}

impl TestCa {
    pub const NAME: &'static str = "CN=Test Root CA,O=Example Vendor,C=US";

    pub fn new() -> Self {
        let key = TestKey::random();
        let der = certificate(Self::NAME, &key, Self::NAME, &key, vec![basic_constraints(true)]);
        Self { key, der }
    }

    /// Issue a leaf certificate.
    pub fn issue(&self, subject: &str, key: &TestKey, extensions: Vec<Extension>) -> Vec<u8> {
        certificate(subject, key, Self::NAME, &self.key, extensions)
    }
}

pub(crate) fn client_data(ty: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": ty,
        "challenge": encoding::base64url(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

pub(crate) fn att_stmt(value: Value) -> AttestationStatement {
    match value {
        Value::Map(entries) => AttestationStatement(entries),
        other => panic!("attestation statement must be a map, got {other:?}"),
    }
}

/// Produces the attestation statement for a registration given the raw authenticator data and
/// the client data hash.
pub(crate) type Attester<'a> = &'a dyn Fn(&[u8], &[u8; 32]) -> (String, AttestationStatement);

/// The `none` attester.
pub(crate) fn no_attestation(_: &[u8], _: &[u8; 32]) -> (String, AttestationStatement) {
    ("none".to_owned(), AttestationStatement::default())
}

/// An authenticator holding one credential in memory.
pub(crate) struct SoftwareAuthenticator {
    pub key: TestKey,
    pub credential_id: Vec<u8>,
    pub aaguid: Aaguid,
    pub counter: u32,
    pub flags: Flags,
    pub user_handle: Vec<u8>,
    pub extensions: AuthenticationExtensionsClientOutputs,
}

impl SoftwareAuthenticator {
    pub fn new() -> Self {
        Self {
            key: TestKey::random(),
            credential_id: random_vec(16),
            aaguid: Aaguid::new_empty(),
            counter: 0,
            flags: Flags::UP | Flags::UV,
            user_handle: Vec::new(),
            extensions: AuthenticationExtensionsClientOutputs::default(),
        }
    }

    pub fn with_counter(mut self, counter: u32) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Raw authenticator data for a registration.
    pub fn registration_auth_data(&self, rp_id: &str) -> Vec<u8> {
        let acd = AttestedCredentialData::new(
            self.aaguid,
            self.credential_id.clone(),
            self.key.credential_key(),
        )
        .expect("attested credential data");
        AuthenticatorData::new(rp_id, self.counter)
            .set_flags(self.flags)
            .set_attested_credential_data(acd)
            .to_vec()
            .expect("authenticator data")
    }

    /// Respond to creation options with a `none` attestation.
    pub fn register(
        &mut self,
        options: &PublicKeyCredentialCreationOptions,
        origin: &str,
    ) -> CreatedPublicKeyCredential {
        self.register_with(options, origin, &no_attestation)
    }

    /// Respond to creation options, attesting with `attester`.
    pub fn register_with(
        &mut self,
        options: &PublicKeyCredentialCreationOptions,
        origin: &str,
        attester: Attester<'_>,
    ) -> CreatedPublicKeyCredential {
        self.user_handle = options.user.id.to_vec();
        let rp_id = options.rp.id.as_deref().unwrap_or(RP_ID);
        let client_data_json = client_data("webauthn.create", &options.challenge, origin);
        let auth_data = self.registration_auth_data(rp_id);
        let (fmt, att_stmt) = attester(&auth_data, &sha256(&client_data_json));
        let attestation_object = AttestationObject {
            fmt,
            att_stmt,
            auth_data,
        }
        .to_vec()
        .expect("attestation object");

        PublicKeyCredential {
            id: encoding::base64url(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAttestationResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: None,
                public_key: None,
                public_key_algorithm: None,
                attestation_object: attestation_object.into(),
                transports: Some(vec![AuthenticatorTransport::Internal]),
            },
            authenticator_attachment: None,
            client_extension_results: self.extensions.clone(),
        }
    }

    /// Increment the counter and sign an assertion for the request options.
    pub fn assert(
        &mut self,
        options: &PublicKeyCredentialRequestOptions,
        origin: &str,
    ) -> AuthenticatedPublicKeyCredential {
        self.counter = self.counter.saturating_add(1);
        self.assert_with_counter(options, origin, self.counter)
    }

    /// Sign an assertion reporting the given counter.
    pub fn assert_with_counter(
        &self,
        options: &PublicKeyCredentialRequestOptions,
        origin: &str,
        counter: u32,
    ) -> AuthenticatedPublicKeyCredential {
        let rp_id = options.rp_id.as_deref().unwrap_or(RP_ID);
        let client_data_json = client_data("webauthn.get", &options.challenge, origin);
        let authenticator_data = AuthenticatorData::new(rp_id, counter)
            .set_flags(self.flags)
            .to_vec()
            .expect("authenticator data");
        let signed = [authenticator_data.as_slice(), &sha256(&client_data_json)].concat();

        PublicKeyCredential {
            id: encoding::base64url(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: authenticator_data.into(),
                signature: self.key.sign(&signed).into(),
                user_handle: (!self.user_handle.is_empty())
                    .then(|| self.user_handle.clone().into()),
                attestation_object: None,
            },
            authenticator_attachment: None,
            client_extension_results: self.extensions.clone(),
        }
    }
}

/// A `packed` self attestation made with the credential key itself.
pub(crate) fn packed_self_attestation(
    key: &TestKey,
) -> impl Fn(&[u8], &[u8; 32]) -> (String, AttestationStatement) + '_ {
    move |auth_data, client_data_hash| {
        let sig = key.sign(&[auth_data, client_data_hash.as_slice()].concat());
        let stmt = cbor!({ "alg" => -7, "sig" => Value::Bytes(sig) }).expect("cbor");
        ("packed".to_owned(), att_stmt(stmt))
    }
}

use coset::iana;
use ed25519_dalek::Signer;
use passkey_rp_types::cose::{CredentialPublicKey, EcCurve, OkpCurve};
use x509_cert::{der::Decode, Certificate};

use super::*;
use crate::{
    testing::{TestCa, TestKey},
    ErrorKind,
};

#[test]
fn es256_signature() {
    let key = TestKey::random();
    let signature = key.sign(b"signed data");

    verify_signature(&key.credential_key(), b"signed data", &signature).expect("valid signature");

    let err = verify_signature(&key.credential_key(), b"other data", &signature)
        .expect_err("signature over different data");
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
}

#[test]
fn es256_rejects_fixed_width_signature() {
    let key = TestKey::random();
    let signature = key.sign_fixed(b"signed data");
    let verifying_key =
        VerifyingKey::from_credential_key(&key.credential_key()).expect("valid key");

    verify_signature(&key.credential_key(), b"signed data", &signature)
        .expect_err("WebAuthn signatures are DER encoded");
    verifying_key
        .verify_with(
            iana::Algorithm::ES256,
            b"signed data",
            &signature,
            EcdsaEncoding::Fixed,
        )
        .expect("JWS style signature");
}

#[test]
fn ed25519_signature() {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7; 32]);
    let key = CredentialPublicKey::Okp {
        alg: iana::Algorithm::EdDSA,
        curve: OkpCurve::Ed25519,
        x: signing_key.verifying_key().to_bytes().to_vec(),
    };
    let signature = signing_key.sign(b"message").to_bytes();

    verify_signature(&key, b"message", &signature).expect("valid signature");
    verify_signature(&key, b"massage", &signature).expect_err("wrong message");
}

#[test]
fn es512_is_decoded_but_not_verified() {
    let key = CredentialPublicKey::Ec2 {
        alg: iana::Algorithm::ES512,
        curve: EcCurve::P521,
        x: vec![1; 66],
        y: vec![2; 66],
    };
    let err = verify_signature(&key, b"data", &[0; 132]).expect_err("unsupported");
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
    assert!(err.detail().contains("unsupported algorithm"));
}

#[test]
fn algorithm_must_match_key() {
    let key = TestKey::random();
    let verifying_key =
        VerifyingKey::from_credential_key(&key.credential_key()).expect("valid key");
    let err = verifying_key
        .verify(iana::Algorithm::EdDSA, b"data", &key.sign(b"data"))
        .expect_err("EdDSA with a P-256 key");
    assert!(err.detail().contains("does not match"));
}

#[test]
fn certificate_keys() {
    let ca = TestCa::new();
    let leaf_key = TestKey::random();
    let leaf = ca.issue("CN=Leaf", &leaf_key, Vec::new());

    let root = Certificate::from_der(&ca.der).expect("root certificate");
    let leaf = Certificate::from_der(&leaf).expect("leaf certificate");

    let root_key = VerifyingKey::from_certificate(&root).expect("root key");
    root_key.verify_certificate(&leaf).expect("issued by the root");
    root_key.verify_certificate(&root).expect("self signed");

    let leaf_verifying_key = VerifyingKey::from_certificate(&leaf).expect("leaf key");
    assert!(leaf_verifying_key.matches(&leaf_key.credential_key()));
    assert!(!leaf_verifying_key.matches(&TestKey::random().credential_key()));
    leaf_verifying_key
        .verify_certificate(&leaf)
        .expect_err("leaf is not self signed");
}

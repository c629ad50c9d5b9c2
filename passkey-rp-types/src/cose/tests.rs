use ciborium::{cbor, value::Value};
use coset::iana;

use super::{CredentialPublicKey, EcCurve};
use crate::CodecError;

// COSE key extracted from the attested credential data of a yubikey version 5
const YUBIKEY_ES256_KEY: [u8; 77] = [
    0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01, 0x21, 0x58, 0x20, 0x0c, 0x98, 0x51, 0xdc, 0x8b, 0xd1,
    0xef, 0x2d, 0x08, 0x4b, 0x20, 0x1c, 0xbf, 0xad, 0xd9, 0xa6, 0x97, 0xbb, 0x48, 0xd9, 0xd7, 0xff,
    0x91, 0x0f, 0x0a, 0x6a, 0xc1, 0x0b, 0x91, 0x2b, 0xe9, 0x58, 0x22, 0x58, 0x20, 0x46, 0x78, 0x6f,
    0x2a, 0x95, 0x76, 0x69, 0x8c, 0x9f, 0x3a, 0xe2, 0x52, 0x3b, 0x4e, 0xb9, 0x4b, 0x8e, 0x07, 0x4c,
    0x35, 0xab, 0xc4, 0xdf, 0x68, 0x8f, 0xcd, 0x85, 0xd2, 0x9a, 0x01, 0xab, 0xba,
];

fn encode(value: Value) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&value, &mut bytes).expect("could not encode test key");
    bytes
}

#[test]
fn decode_yubikey_es256_key() {
    let key = CredentialPublicKey::from_cose(&YUBIKEY_ES256_KEY).expect("could not decode key");

    let CredentialPublicKey::Ec2 { alg, curve, x, y } = &key else {
        panic!("expected an EC2 key, got {key:?}");
    };
    assert_eq!(*alg, iana::Algorithm::ES256);
    assert_eq!(*curve, EcCurve::P256);
    assert_eq!(x[..4], [0x0c, 0x98, 0x51, 0xdc]);
    assert_eq!(y[..4], [0x46, 0x78, 0x6f, 0x2a]);

    let point = key.uncompressed_point().expect("EC2 keys have a point");
    assert_eq!(point.len(), 65);
    assert_eq!(point[0], 0x04);
}

#[test]
fn decode_ed25519_key() {
    let bytes = encode(
        cbor!({
            1 => 1,
            3 => -8,
            -1 => 6,
            -2 => Value::Bytes(vec![7; 32]),
        })
        .expect("valid cbor"),
    );
    let key = CredentialPublicKey::from_cose(&bytes).expect("could not decode key");
    assert_eq!(key.alg(), iana::Algorithm::EdDSA);
    assert!(key.uncompressed_point().is_none());
}

#[test]
fn rsa_key_survives_storage_encoding() {
    let key = CredentialPublicKey::Rsa {
        alg: iana::Algorithm::RS256,
        n: vec![0xc3; 256],
        e: vec![0x01, 0x00, 0x01],
    };
    let json = serde_json::to_string(&key).expect("could not serialize key");
    let back: CredentialPublicKey = serde_json::from_str(&json).expect("could not read key");
    assert_eq!(back, key);
}

#[test]
fn x25519_is_not_a_signing_key() {
    let bytes = encode(
        cbor!({
            1 => 1,
            3 => -25,
            -1 => 4,
            -2 => Value::Bytes(vec![7; 32]),
        })
        .expect("valid cbor"),
    );
    let err = CredentialPublicKey::from_cose(&bytes).expect_err("X25519 should be rejected");
    assert!(matches!(err, CodecError::UnsupportedKeyType(_)), "{err:?}");
}

#[test]
fn symmetric_keys_are_unsupported() {
    let bytes = encode(
        cbor!({
            1 => 4,
            3 => 5,
            -1 => Value::Bytes(vec![1; 32]),
        })
        .expect("valid cbor"),
    );
    let err = CredentialPublicKey::from_cose(&bytes).expect_err("symmetric key accepted");
    assert!(matches!(err, CodecError::UnsupportedKeyType(_)), "{err:?}");
}

#[test]
fn truncated_coordinates_are_malformed() {
    let bytes = encode(
        cbor!({
            1 => 2,
            3 => -7,
            -1 => 1,
            -2 => Value::Bytes(vec![1; 32]),
            -3 => Value::Bytes(vec![1; 31]),
        })
        .expect("valid cbor"),
    );
    let err = CredentialPublicKey::from_cose(&bytes).expect_err("short y accepted");
    assert!(matches!(err, CodecError::MalformedCoseKey(_)), "{err:?}");
}

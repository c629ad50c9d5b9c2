use super::Aaguid;

const YUBIKEY_5_NFC: [u8; 16] = [
    0x2f, 0xc0, 0x57, 0x9f, 0x81, 0x13, 0x47, 0xea, 0xb1, 0x16, 0xbb, 0x5a, 0x8d, 0xb9, 0x20, 0x2a,
];

#[test]
fn deserialize_byte_str_to_aaguid() {
    let cbor_bytes = [
        0x50, // bytes(16)
        0x02, 0x2b, 0xeb, 0xfd, 0x62, 0x3c, 0xac, 0x25, // data
        0xce, 0xe4, 0xd0, 0x90, 0xb9, 0xf8, 0xb5, 0xaf,
    ];

    let aaguid: Aaguid = ciborium::de::from_reader(cbor_bytes.as_slice())
        .expect("could not deserialize from byte string");
    assert_eq!(
        aaguid,
        Aaguid([
            0x02, 0x2b, 0xeb, 0xfd, 0x62, 0x3c, 0xac, 0x25, 0xce, 0xe4, 0xd0, 0x90, 0xb9, 0xf8,
            0xb5, 0xaf,
        ])
    );
}

#[test]
fn displays_as_metadata_service_uuid() {
    let aaguid = Aaguid(YUBIKEY_5_NFC);
    assert_eq!(aaguid.to_string(), "2fc0579f-8113-47ea-b116-bb5a8db9202a");

    let parsed: Aaguid = "2fc0579f-8113-47ea-b116-bb5a8db9202a"
        .parse()
        .expect("could not parse uuid");
    assert_eq!(parsed, aaguid);
}

#[test]
fn json_uses_uuid_strings() {
    let json = serde_json::to_string(&Aaguid(YUBIKEY_5_NFC)).expect("could not serialize");
    assert_eq!(json, r#""2fc0579f-8113-47ea-b116-bb5a8db9202a""#);

    let back: Aaguid = serde_json::from_str(&json).expect("could not deserialize");
    assert_eq!(back, Aaguid(YUBIKEY_5_NFC));
}

#[test]
fn new_empty_truly_zero() {
    assert!(Aaguid::new_empty().is_empty());
    assert!(!Aaguid(YUBIKEY_5_NFC).is_empty());
}

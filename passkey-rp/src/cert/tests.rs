use chrono::{Duration, Utc};
use passkey_rp_types::authenticator::Aaguid;

use super::*;
use crate::{
    testing::{aaguid_extension, basic_constraints, certificate, TestCa, TestKey},
    ErrorKind,
};

const AAGUID: Aaguid = Aaguid([
    0x2f, 0xc0, 0x57, 0x9f, 0x81, 0x13, 0x47, 0xea, 0xb1, 0x16, 0xbb, 0x5a, 0x8d, 0xb9, 0x20, 0x2a,
]);

#[test]
fn leaf_attributes() {
    let ca = TestCa::new();
    let leaf = ca.issue(
        "CN=Batch 1,OU=Authenticator Attestation,O=Example Vendor,C=US",
        &TestKey::random(),
        vec![aaguid_extension(AAGUID), basic_constraints(false)],
    );
    let leaf = parse(&leaf).expect("leaf");

    assert!(is_v3(&leaf));
    assert!(!is_ca(&leaf).expect("basic constraints"));
    assert_eq!(aaguid(&leaf).expect("extension"), Some(AAGUID));
    assert_eq!(
        subject_attribute(&leaf, "OU").as_deref(),
        Some("Authenticator Attestation")
    );
    assert_eq!(subject_attribute(&leaf, "CN").as_deref(), Some("Batch 1"));
    assert!(!has_empty_subject(&leaf));
    assert!(extended_key_usages(&leaf).expect("no eku").is_empty());

    check_aaguid(&leaf, &AAGUID).expect("matching aaguid");
    let err = check_aaguid(&leaf, &Aaguid::new_empty()).expect_err("other aaguid");
    assert_eq!(err.kind(), ErrorKind::MalformedAttestation);

    let root = parse(&ca.der).expect("root");
    assert!(is_ca(&root).expect("basic constraints"));
    assert_eq!(aaguid(&root).expect("no extension"), None);
}

#[test]
fn garbage_is_malformed() {
    let err = parse(&[0x30, 0x03, 0x01, 0x01]).expect_err("not a certificate");
    assert_eq!(err.kind(), ErrorKind::MalformedAttestation);
}

#[test]
fn chain_to_root() {
    let ca = TestCa::new();
    let leaf = parse(&ca.issue("CN=Leaf", &TestKey::random(), Vec::new())).expect("leaf");
    let root = parse(&ca.der).expect("root");

    verify_chain(&[leaf.clone()], &[root.clone()], Utc::now()).expect("signed by the root");
    verify_chain(&[leaf.clone(), root.clone()], &[root.clone()], Utc::now())
        .expect("chain including the root");

    let other = parse(&TestCa::new().der).expect("other root");
    let err = verify_chain(&[leaf.clone()], &[other], Utc::now()).expect_err("foreign root");
    assert_eq!(err.kind(), ErrorKind::AttestationNotTrusted);

    let err = verify_chain(&[leaf], &[root], Utc::now() + Duration::days(2))
        .expect_err("expired leaf");
    assert_eq!(err.kind(), ErrorKind::AttestationNotTrusted);
}

#[test]
fn broken_chain() {
    let ca = TestCa::new();
    let intermediate_key = TestKey::random();
    let intermediate = certificate(
        "CN=Intermediate",
        &intermediate_key,
        TestCa::NAME,
        &ca.key,
        vec![basic_constraints(true)],
    );
    // claims to be issued by the intermediate but is signed by an unrelated key
    let leaf = certificate(
        "CN=Leaf",
        &TestKey::random(),
        "CN=Intermediate",
        &TestKey::random(),
        Vec::new(),
    );

    let chain = [
        parse(&leaf).expect("leaf"),
        parse(&intermediate).expect("intermediate"),
    ];
    let err = verify_chain(&chain, &[parse(&ca.der).expect("root")], Utc::now())
        .expect_err("bad leaf signature");
    assert!(err.detail().contains("broken certificate chain"));
}

use super::*;

#[test]
fn parse_client_data_with_unknown_keys() {
    let json = br#"{"type":"webauthn.get","challenge":"3q2-7w","origin":"https://future.1password.com","crossOrigin":false,"other_keys_can_be_added_here":"do not compare clientDataJSON against a template. See https://goo.gl/yabPex"}"#;

    let client_data = CollectedClientData::from_json(json).expect("could not parse client data");
    assert_eq!(client_data.ty, ClientDataType::Get);
    assert_eq!(client_data.challenge, "3q2-7w");
    assert_eq!(client_data.origin, "https://future.1password.com");
    assert_eq!(client_data.cross_origin, Some(false));
    assert!(client_data.token_binding.is_none());
    assert!(client_data
        .unknown_keys
        .contains_key("other_keys_can_be_added_here"));
}

#[test]
fn token_binding_statuses() {
    let json = br#"{"type":"webauthn.create","challenge":"AA","origin":"https://a.example","tokenBinding":{"status":"present","id":"AQID"}}"#;
    let client_data = CollectedClientData::from_json(json).expect("could not parse client data");
    assert_eq!(
        client_data.token_binding,
        Some(TokenBinding {
            status: TokenBindingStatus::Present,
            id: Some("AQID".into())
        })
    );

    let json = br#"{"type":"webauthn.create","challenge":"AA","origin":"https://a.example","tokenBinding":{"status":"maybe"}}"#;
    let client_data = CollectedClientData::from_json(json).expect("could not parse client data");
    assert_eq!(
        client_data.token_binding.map(|tb| tb.status),
        Some(TokenBindingStatus::Unknown)
    );
}

#[test]
fn unknown_ceremony_type_is_rejected() {
    let json = br#"{"type":"webauthn.delete","challenge":"AA","origin":"https://a.example"}"#;
    CollectedClientData::from_json(json).expect_err("unknown type accepted");
}

#[test]
fn client_data_type_display() {
    assert_eq!(ClientDataType::Create.to_string(), "webauthn.create");
    assert_eq!(ClientDataType::Get.to_string(), "webauthn.get");
}

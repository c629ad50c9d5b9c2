//! Checks on the `clientDataJSON` shared by both ceremonies.

use passkey_rp_types::{
    encoding,
    webauthn::{ClientDataType, CollectedClientData, TokenBindingStatus},
};

use crate::{Error, ErrorKind, RelyingPartyConfig};

/// Parse the raw client data and check it belongs to the expected ceremony.
///
/// The checks run in order: JSON structure, ceremony type, challenge, origin, cross-origin
/// embedding, then token binding.
pub(crate) fn verify_client_data(
    config: &RelyingPartyConfig,
    raw: &[u8],
    expected_type: ClientDataType,
    challenge: &[u8],
) -> Result<CollectedClientData, Error> {
    let client_data = CollectedClientData::from_json(raw)
        .map_err(|e| Error::malformed(format!("clientDataJSON: {e}")))?;

    if client_data.ty != expected_type {
        return Err(Error::malformed(format!(
            "client data type is {}, expected {expected_type}",
            client_data.ty
        )));
    }

    let received = encoding::try_from_base64url(&client_data.challenge)
        .ok_or_else(|| Error::malformed("challenge is not base64url"))?;
    if received != challenge {
        return Err(Error::new(
            ErrorKind::ChallengeMismatch,
            "challenge does not match the issued options",
        ));
    }

    if !config.is_allowed_origin(&client_data.origin) {
        return Err(Error::new(
            ErrorKind::OriginNotAllowed,
            format!("origin {} is not allowed", client_data.origin),
        ));
    }

    if client_data.cross_origin == Some(true) {
        if !config.allow_cross_origin {
            return Err(Error::new(
                ErrorKind::OriginNotAllowed,
                "cross-origin requests are not allowed",
            ));
        }
        if let Some(top_origin) = &client_data.top_origin {
            if !config.is_allowed_origin(top_origin) {
                return Err(Error::new(
                    ErrorKind::OriginNotAllowed,
                    format!("top origin {top_origin} is not allowed"),
                ));
            }
        }
    }

    if let Some(token_binding) = &client_data.token_binding {
        match token_binding.status {
            TokenBindingStatus::Unknown => {
                return Err(Error::malformed("unknown token binding status"))
            }
            TokenBindingStatus::Present if token_binding.id.is_none() => {
                return Err(Error::malformed("token binding is present without an id"))
            }
            _ => {}
        }
    }

    Ok(client_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_data, ORIGIN, RP_ID};

    const CHALLENGE: &[u8] = b"sixteen byte chl";

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new(RP_ID, "Example", [ORIGIN])
    }

    fn check(raw: &[u8]) -> Result<CollectedClientData, Error> {
        verify_client_data(&config(), raw, ClientDataType::Create, CHALLENGE)
    }

    #[test]
    fn accepts_matching_client_data() {
        let parsed = check(&client_data("webauthn.create", CHALLENGE, ORIGIN))
            .expect("valid client data");
        assert_eq!(parsed.origin, ORIGIN);
    }

    #[test]
    fn rejects_the_other_ceremony() {
        let err = check(&client_data("webauthn.get", CHALLENGE, ORIGIN))
            .expect_err("get data used for create");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn challenge_is_compared_bytewise() {
        let err = check(&client_data("webauthn.create", b"sixteen byte chm", ORIGIN))
            .expect_err("different challenge");
        assert_eq!(err.kind(), ErrorKind::ChallengeMismatch);
    }

    #[test]
    fn unlisted_origin() {
        let err = check(&client_data(
            "webauthn.create",
            CHALLENGE,
            "https://example.com.evil.test",
        ))
        .expect_err("foreign origin");
        assert_eq!(err.kind(), ErrorKind::OriginNotAllowed);
    }

    #[test]
    fn cross_origin_requires_opt_in() {
        let raw = serde_json::json!({
            "type": "webauthn.create",
            "challenge": encoding::base64url(CHALLENGE),
            "origin": ORIGIN,
            "crossOrigin": true,
            "topOrigin": "https://shop.example.net",
        })
        .to_string();
        let err = check(raw.as_bytes()).expect_err("cross origin");
        assert_eq!(err.kind(), ErrorKind::OriginNotAllowed);

        let permissive = config().allow_cross_origin(true);
        let err = verify_client_data(&permissive, raw.as_bytes(), ClientDataType::Create, CHALLENGE)
            .expect_err("top origin not listed");
        assert!(err.detail().contains("top origin"));
    }

    #[test]
    fn token_binding_status() {
        let with_binding = |binding: serde_json::Value| {
            serde_json::json!({
                "type": "webauthn.create",
                "challenge": encoding::base64url(CHALLENGE),
                "origin": ORIGIN,
                "tokenBinding": binding,
            })
            .to_string()
        };

        check(with_binding(serde_json::json!({ "status": "supported" })).as_bytes())
            .expect("supported is fine");
        check(with_binding(serde_json::json!({ "status": "present", "id": "AQID" })).as_bytes())
            .expect("present with id");
        let err = check(with_binding(serde_json::json!({ "status": "present" })).as_bytes())
            .expect_err("present without id");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        let err = check(with_binding(serde_json::json!({ "status": "bogus" })).as_bytes())
            .expect_err("unknown status");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let raw = serde_json::json!({
            "type": "webauthn.create",
            "challenge": encoding::base64url(CHALLENGE),
            "origin": ORIGIN,
            "other_keys_can_be_added_here": "do not compare clientDataJSON against a template",
        })
        .to_string();
        let parsed = check(raw.as_bytes()).expect("extra keys");
        assert_eq!(parsed.unknown_keys.len(), 1);
    }
}

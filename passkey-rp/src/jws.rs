//! Compact JWS verification with keys taken from the `x5c` header.
//!
//! Used for SafetyNet attestation responses and for the metadata BLOB.

use coset::iana;
use passkey_rp_types::encoding;
use serde::Deserialize;
use x509_cert::Certificate;

use crate::{
    cert,
    crypto::{EcdsaEncoding, VerifyingKey},
    Error,
};

#[derive(Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    x5c: Vec<String>,
}

/// A JWS whose signature verified with the leaf of its own `x5c` chain.
///
/// The chain itself is not trusted yet, callers must anchor it.
#[derive(Debug)]
pub(crate) struct SignedJws {
    pub payload: Vec<u8>,
    pub chain: Vec<Certificate>,
    pub chain_der: Vec<Vec<u8>>,
}

fn algorithm(name: &str) -> Option<iana::Algorithm> {
    Some(match name {
        "ES256" => iana::Algorithm::ES256,
        "ES384" => iana::Algorithm::ES384,
        "RS256" => iana::Algorithm::RS256,
        "RS384" => iana::Algorithm::RS384,
        "RS512" => iana::Algorithm::RS512,
        "PS256" => iana::Algorithm::PS256,
        "EdDSA" => iana::Algorithm::EdDSA,
        _ => return None,
    })
}

/// Check the signature of a compact JWS against the leaf certificate of its `x5c` header.
pub(crate) fn verify(token: &str) -> Result<SignedJws, Error> {
    let malformed = |what: &str| Error::malformed_attestation(format!("jws: {what}"));

    let mut parts = token.trim().split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("expected three parts"));
    };

    let header = encoding::try_from_base64url(header_b64).ok_or_else(|| malformed("header"))?;
    let header: Header =
        serde_json::from_slice(&header).map_err(|e| malformed(&format!("header: {e}")))?;
    let payload = encoding::try_from_base64url(payload_b64).ok_or_else(|| malformed("payload"))?;
    let signature =
        encoding::try_from_base64url(signature_b64).ok_or_else(|| malformed("signature"))?;

    let alg = algorithm(&header.alg)
        .ok_or_else(|| Error::signature(format!("unsupported algorithm: {}", header.alg)))?;
    let chain_der = header
        .x5c
        .iter()
        .map(|cert| encoding::try_from_base64(cert).ok_or_else(|| malformed("x5c entry")))
        .collect::<Result<Vec<_>, _>>()?;
    let chain = cert::parse_chain(&chain_der)?;
    let leaf = chain.first().ok_or_else(|| malformed("missing x5c"))?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    VerifyingKey::from_certificate(leaf)?.verify_with(
        alg,
        signing_input.as_bytes(),
        &signature,
        EcdsaEncoding::Fixed,
    )?;

    Ok(SignedJws {
        payload,
        chain,
        chain_der,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use passkey_rp_types::encoding;

    use super::verify;
    use crate::{
        testing::{TestCa, TestKey},
        ErrorKind,
    };

    /// Sign `payload` as an ES256 JWS carrying `chain` in its header.
    pub(crate) fn sign(key: &TestKey, chain: &[&[u8]], payload: &serde_json::Value) -> String {
        let header = serde_json::json!({
            "alg": "ES256",
            "x5c": chain.iter().map(|der| encoding::base64(der)).collect::<Vec<_>>(),
        });
        let signing_input = format!(
            "{}.{}",
            encoding::base64url(header.to_string().as_bytes()),
            encoding::base64url(payload.to_string().as_bytes())
        );
        let signature = key.sign_fixed(signing_input.as_bytes());
        format!("{signing_input}.{}", encoding::base64url(&signature))
    }

    #[test]
    fn verifies_with_leaf_key() {
        let ca = TestCa::new();
        let key = TestKey::random();
        let leaf = ca.issue("CN=attest.android.com", &key, Vec::new());
        let token = sign(&key, &[&leaf, &ca.der], &serde_json::json!({"hello": "world"}));

        let jws = verify(&token).expect("valid jws");
        assert_eq!(jws.chain.len(), 2);
        assert_eq!(jws.chain_der[0], leaf);
        assert_eq!(jws.payload, br#"{"hello":"world"}"#);
    }

    #[test]
    fn rejects_tampering() {
        let ca = TestCa::new();
        let key = TestKey::random();
        let leaf = ca.issue("CN=attest.android.com", &key, Vec::new());
        let token = sign(&key, &[&leaf], &serde_json::json!({"n": 1}));

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = encoding::base64url(br#"{"n":2}"#);
        parts[1] = &forged;
        let err = verify(&parts.join(".")).expect_err("payload changed");
        assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

        let err = verify("only.two").expect_err("not a jws");
        assert_eq!(err.kind(), ErrorKind::MalformedAttestation);
    }

    #[test]
    fn requires_certificate() {
        let key = TestKey::random();
        let token = sign(&key, &[], &serde_json::json!({}));
        let err = verify(&token).expect_err("no x5c");
        assert!(err.detail().contains("missing x5c"));
    }
}

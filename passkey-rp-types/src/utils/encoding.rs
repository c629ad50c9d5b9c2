//! Encoding helpers so that every byte field crossing the JSON boundary uses the same alphabet.
//!
//! Browsers emit unpadded base64url, but some clients and the FIDO metadata service use padded
//! standard base64, so decoding is lenient about padding.

use data_encoding::{BASE64, BASE64URL_NOPAD, BASE64_NOPAD};

const PADDING: char = '=';

/// Convert bytes to base64 with padding, as used by `x5c` headers and the metadata service.
pub fn base64(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Convert bytes to base64url without padding
pub fn base64url(data: &[u8]) -> String {
    BASE64URL_NOPAD.encode(data)
}

/// Try parsing from base64 with or without padding
pub fn try_from_base64(input: &str) -> Option<Vec<u8>> {
    let sane_string = input.trim_end_matches(PADDING);
    BASE64_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Try parsing from base64url with or without padding
pub fn try_from_base64url(input: &str) -> Option<Vec<u8>> {
    let sane_string = input.trim_end_matches(PADDING);
    BASE64URL_NOPAD.decode(sane_string.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_accepts_padding() {
        let expected = vec![0xfb, 0xff, 0x01];
        assert_eq!(try_from_base64url("-_8B"), Some(expected.clone()));
        assert_eq!(try_from_base64url("-_8B=="), Some(expected));
    }

    #[test]
    fn base64url_rejects_standard_alphabet() {
        assert_eq!(try_from_base64url("+/8B"), None);
        assert_eq!(try_from_base64("+/8B"), Some(vec![0xfb, 0xff, 0x01]));
    }
}

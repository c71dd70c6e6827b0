//! Heuristic base64 detection.
//!
//! A string is decoded only when it is non-empty, a multiple of four long,
//! entirely in the standard base64 alphabet, actually decodes, and at most
//! 20 % of the decoded bytes are non-printable. False positives (short
//! alphanumeric words) and false negatives are both possible.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;

static BASE64_ALPHABET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("valid regex"));

const MAX_NON_PRINTABLE_RATIO: f64 = 0.2;

/// Decode `s` if it looks like base64-encoded text, otherwise borrow it back.
///
/// The decoded text has trailing whitespace and NUL bytes removed.
pub fn decode_if_encoded(s: &str) -> Cow<'_, str> {
    match decode_text(s) {
        Some(decoded) => Cow::Owned(decoded),
        None => Cow::Borrowed(s),
    }
}

/// Walk `value` and decode every eligible string; other scalars pass through.
pub fn decode_value(value: Value) -> Value {
    match value {
        Value::String(s) => match decode_text(&s) {
            Some(decoded) => Value::String(decoded),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(decode_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, decode_value(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Parse `json` and decode every eligible string inside it.
pub fn decode_json_str(json: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(json).map(decode_value)
}

fn decode_text(s: &str) -> Option<String> {
    if s.is_empty() || s.len() % 4 != 0 || !BASE64_ALPHABET.is_match(s) {
        return None;
    }
    let bytes = STANDARD.decode(s).ok()?;
    if !mostly_printable(&bytes) {
        return None;
    }
    let text = String::from_utf8_lossy(&bytes);
    Some(text.trim_end_matches([' ', '\t', '\r', '\n', '\0']).to_owned())
}

fn mostly_printable(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return true;
    }
    let non_printable = bytes
        .iter()
        .filter(|&&b| !matches!(b, 32..=126 | b'\t' | b'\n' | b'\r'))
        .count();
    non_printable as f64 / bytes.len() as f64 <= MAX_NON_PRINTABLE_RATIO
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_printable_payload() {
        assert_eq!(decode_if_encoded("SGVsbG8gd29ybGQ="), "Hello world");
    }

    #[test]
    fn strips_trailing_whitespace_and_nul() {
        // "abc \n\0" encoded.
        assert_eq!(decode_if_encoded("YWJjIAoA"), "abc");
    }

    #[test]
    fn keeps_strings_that_decode_to_binary() {
        // Valid base64, 16 chars, decodes to mostly non-printable bytes.
        let s = "AAECAwQFBgcICQoL";
        assert!(matches!(decode_if_encoded(s), Cow::Borrowed(b) if b == s));
    }

    #[test]
    fn keeps_non_base64_text() {
        for s in ["", "abc", "hello world!", "abcd=efg", "ab==cd=="] {
            assert!(matches!(decode_if_encoded(s), Cow::Borrowed(_)), "{s:?} should pass through");
        }
    }

    #[test]
    fn walks_nested_structures() {
        let input = json!({
            "name": "SGVsbG8gd29ybGQ=",
            "count": 3,
            "tags": ["SGVsbG8gd29ybGQ=", null, true],
            "nested": { "inner": "plain text" }
        });
        let out = decode_value(input);
        assert_eq!(out["name"], "Hello world");
        assert_eq!(out["count"], 3);
        assert_eq!(out["tags"], json!(["Hello world", null, true]));
        assert_eq!(out["nested"]["inner"], "plain text");
    }

    #[test]
    fn decode_json_str_rejects_invalid_json() {
        assert!(decode_json_str("{not json").is_err());
        assert_eq!(decode_json_str(r#"["SGVsbG8gd29ybGQ="]"#).unwrap(), json!(["Hello world"]));
    }
}

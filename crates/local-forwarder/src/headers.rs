use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// Content type assumed when the relayed request did not carry one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Framing headers describing the origin request's body. The transport
/// recomputes them for the re-encoded body.
const STRIPPED_HEADERS: &[&str] = &["content-length", "transfer-encoding"];

/// Normalise relayed headers for the local request.
///
/// Keys are lower-cased (later duplicates win), framing headers are dropped,
/// non-string values are converted to strings, and `content-type` defaults to
/// [`DEFAULT_CONTENT_TYPE`].
pub fn sanitize_headers(headers: Option<&Map<String, Value>>) -> BTreeMap<String, String> {
    let mut clean: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in headers.into_iter().flatten() {
        let key = key.to_ascii_lowercase();
        if STRIPPED_HEADERS.contains(&key.as_str()) {
            continue;
        }
        clean.insert(key, header_value_string(value));
    }

    clean
        .entry("content-type".to_string())
        .or_insert_with(|| DEFAULT_CONTENT_TYPE.to_string());

    clean
}

/// Convert sanitized headers into an [`HeaderMap`], skipping entries that are
/// not valid HTTP header names or values.
pub fn to_header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (key, value) in headers {
        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %key, "dropping header with invalid name");
                continue;
            }
        };
        let value = match HeaderValue::from_str(value) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(header = %key, "dropping header with invalid value");
                continue;
            }
        };
        map.insert(name, value);
    }

    map
}

/// String form of a JSON header value. Arrays become comma-separated lists,
/// which is how repeated HTTP headers combine.
fn header_value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(header_value_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn content_length_is_dropped_in_any_casing() {
        for key in ["content-length", "Content-Length", "CONTENT-LENGTH", "cOnTeNt-LeNgTh"] {
            let input = headers(json!({ key: "42", "x-keep": "yes" }));
            let clean = sanitize_headers(Some(&input));
            assert!(
                clean.keys().all(|k| !k.eq_ignore_ascii_case("content-length")),
                "content-length leaked for key {key}"
            );
            assert_eq!(clean.get("x-keep").map(String::as_str), Some("yes"));
        }
    }

    #[test]
    fn transfer_encoding_is_dropped() {
        let input = headers(json!({"Transfer-Encoding": "chunked"}));
        assert!(!sanitize_headers(Some(&input)).contains_key("transfer-encoding"));
    }

    #[test]
    fn keys_are_lower_cased() {
        let input = headers(json!({"X-Signature": "abc", "Stripe-Signature": "t=1"}));
        let clean = sanitize_headers(Some(&input));
        assert_eq!(clean.get("x-signature").map(String::as_str), Some("abc"));
        assert_eq!(clean.get("stripe-signature").map(String::as_str), Some("t=1"));
    }

    #[test]
    fn content_type_defaults_to_json() {
        assert_eq!(
            sanitize_headers(None).get("content-type").map(String::as_str),
            Some(DEFAULT_CONTENT_TYPE)
        );
        let input = headers(json!({}));
        assert_eq!(
            sanitize_headers(Some(&input)).get("content-type").map(String::as_str),
            Some(DEFAULT_CONTENT_TYPE)
        );
    }

    #[test]
    fn existing_content_type_is_kept_regardless_of_casing() {
        let input = headers(json!({"Content-Type": "text/plain"}));
        let clean = sanitize_headers(Some(&input));
        assert_eq!(clean.get("content-type").map(String::as_str), Some("text/plain"));
        assert_eq!(clean.len(), 1);
    }

    #[test]
    fn non_string_values_are_stringified() {
        let input = headers(json!({
            "x-count": 5,
            "x-flag": true,
            "x-null": null,
            "x-list": ["a", "b", 3],
        }));
        let clean = sanitize_headers(Some(&input));
        assert_eq!(clean["x-count"], "5");
        assert_eq!(clean["x-flag"], "true");
        assert_eq!(clean["x-null"], "null");
        assert_eq!(clean["x-list"], "a,b,3");
    }

    #[test]
    fn invalid_headers_are_skipped_in_header_map() {
        let mut clean = BTreeMap::new();
        clean.insert("good".to_string(), "value".to_string());
        clean.insert("bad name".to_string(), "value".to_string());
        clean.insert("bad-value".to_string(), "line\nbreak".to_string());

        let map = to_header_map(&clean);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("good").unwrap(), "value");
    }
}

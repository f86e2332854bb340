//! Body and query-string serialization.
//!
//! # Design
//! Two URL encoders exist because body and query params followed different
//! rules in the system this facade replaces, and callers depend on both:
//!
//! - Form bodies: `null` and nested objects are sent as an empty value
//!   (`key=`), arrays repeat the key (`k=a&k=b`).
//! - Query strings: `null` keys are dropped, arrays use the bracket form
//!   (`k[]=a&k[]=b`), nested objects are sent as JSON text.
//!
//! Both require the params to be an object; any other shape is a setup
//! failure.

use bytes::Bytes;
use serde_json::{Map, Value};
use url::form_urlencoded;
use url::Url;

use crate::error::SetupError;

pub fn json_body(params: &Value) -> Result<Bytes, SetupError> {
    Ok(Bytes::from(serde_json::to_vec(params)?))
}

/// `application/x-www-form-urlencoded` body.
pub fn urlencoded_body(params: &Value) -> Result<String, SetupError> {
    let fields = as_object(params, "urlencoded")?;
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    serializer.append_pair(key, &form_scalar(item));
                }
            }
            other => {
                serializer.append_pair(key, &form_scalar(other));
            }
        }
    }
    Ok(serializer.finish())
}

/// Append params to the query string of `url`. Leaves the URL untouched when
/// nothing survives encoding.
pub fn append_query(url: &mut Url, params: &Value) -> Result<(), SetupError> {
    let fields = as_object(params, "query")?;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let key = format!("{key}[]");
                pairs.extend(
                    items
                        .iter()
                        .filter(|item| !item.is_null())
                        .map(|item| (key.clone(), query_scalar(item))),
                );
            }
            other => pairs.push((key.clone(), query_scalar(other))),
        }
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(())
}

/// Parse a response body as JSON. Empty, malformed or `null` bodies give
/// `None`; this never fails. Falsy values (`0`, `false`, `""`) are kept as
/// data, not collapsed to `None`.
pub fn parse_json_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) | Err(_) => None,
        Ok(value) => Some(value),
    }
}

fn as_object<'a>(params: &'a Value, target: &'static str) -> Result<&'a Map<String, Value>, SetupError> {
    params
        .as_object()
        .ok_or(SetupError::UnsupportedParams(target))
}

fn form_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn query_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urlencoded_keeps_insertion_order() {
        let body = urlencoded_body(&json!({"b": "2", "a": "1"})).unwrap();
        assert_eq!(body, "b=2&a=1");
    }

    #[test]
    fn urlencoded_null_and_nested_values_are_empty() {
        let body = urlencoded_body(&json!({
            "param1": "yellow",
            "param3": null,
            "nested": {"x": 1},
            "n": 5,
            "flag": true
        }))
        .unwrap();
        assert_eq!(body, "param1=yellow&param3=&nested=&n=5&flag=true");
    }

    #[test]
    fn urlencoded_arrays_repeat_key() {
        let body = urlencoded_body(&json!({"special": ["quick", "brown", "fox"]})).unwrap();
        assert_eq!(body, "special=quick&special=brown&special=fox");
    }

    #[test]
    fn urlencoded_escapes_reserved_characters() {
        let body = urlencoded_body(&json!({"q": "a&b=c d"})).unwrap();
        assert_eq!(body, "q=a%26b%3Dc+d");
    }

    #[test]
    fn urlencoded_rejects_non_objects() {
        assert!(matches!(
            urlencoded_body(&json!(["a", "b"])),
            Err(SetupError::UnsupportedParams("urlencoded"))
        ));
    }

    #[test]
    fn query_drops_nulls_and_brackets_arrays() {
        let mut url = Url::parse("https://postman-echo.com/get").unwrap();
        append_query(
            &mut url,
            &json!({
                "param1": "yellow",
                "param3": null,
                "special": ["quick", null, "fox"],
                "filter": {"a": 1}
            }),
        )
        .unwrap();
        assert_eq!(
            url.query(),
            Some("param1=yellow&special%5B%5D=quick&special%5B%5D=fox&filter=%7B%22a%22%3A1%7D")
        );
    }

    #[test]
    fn query_appends_to_existing_query() {
        let mut url = Url::parse("http://localhost/echo?x=1").unwrap();
        append_query(&mut url, &json!({"y": 2})).unwrap();
        assert_eq!(url.as_str(), "http://localhost/echo?x=1&y=2");
    }

    #[test]
    fn query_with_only_nulls_leaves_url_alone() {
        let mut url = Url::parse("http://localhost/echo").unwrap();
        append_query(&mut url, &json!({"gone": null})).unwrap();
        assert_eq!(url.as_str(), "http://localhost/echo");
    }

    #[test]
    fn json_body_serializes_compactly() {
        let body = json_body(&json!({"a": "1", "b": "2"})).unwrap();
        assert_eq!(body.as_ref(), br#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn parse_json_body_fails_soft() {
        assert_eq!(parse_json_body(br#"{"ok":true}"#), Some(json!({"ok": true})));
        assert_eq!(parse_json_body(b"{not json"), None);
        assert_eq!(parse_json_body(b""), None);
        assert_eq!(parse_json_body(b"  \n"), None);
        assert_eq!(parse_json_body(b"null"), None);
        assert_eq!(parse_json_body(b"0"), Some(json!(0)));
        assert_eq!(parse_json_body(b"false"), Some(json!(false)));
        assert_eq!(parse_json_body(br#""""#), Some(json!("")));
    }
}

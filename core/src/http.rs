//! HTTP request and response types as plain data.
//!
//! # Design
//! `HttpRequest` is the fully assembled request configuration: every
//! decision (headers, auth, body encoding, query string) has already been
//! made by `client::build_request`, so the dispatch step only has to hand it
//! to the HTTP client. `HttpResponse` is the normalized result handed back to
//! callers, whatever the status code.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SetupError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// POST, PUT and PATCH carry params in the body; everything else in the
    /// query string.
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(SetupError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Shape the response body is delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Parsed structured value; malformed bodies become `None`.
    #[default]
    Json,
    /// `"document"` has no DOM to parse into here and reads as text.
    #[serde(alias = "document")]
    Text,
    /// Raw bytes, untouched. `"blob"` and `"stream"` read as bytes; the body
    /// is buffered either way.
    #[serde(rename = "arraybuffer", alias = "bytes", alias = "blob", alias = "stream")]
    Bytes,
}

/// A fully assembled outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Correlates log lines of one request.
    pub id: Uuid,
    pub method: HttpMethod,
    /// Final URL, query string included.
    pub url: String,
    /// Header order is preserved; names are unique case-insensitively.
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Replaces the client default timeout for this request only.
    pub timeout: Option<Duration>,
    pub response_type: ResponseType,
    pub with_credentials: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            response_type: ResponseType::default(),
            with_credentials: true,
        }
    }

    /// Set a header, replacing any existing header with the same name
    /// (case-insensitive) in place.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => *slot = (name.to_string(), value.to_string()),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// Response body in the shape asked for by `ResponseType`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

/// A normalized response. Delivered for every status code, 2xx or not.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Lower-cased header names; repeated headers are joined with `", "`.
    pub headers: BTreeMap<String, String>,
    /// `None` when the body is empty, or malformed for `ResponseType::Json`.
    pub data: Option<ResponseData>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.data {
            Some(ResponseData::Json(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            Some(ResponseData::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.data {
            Some(ResponseData::Bytes(b)) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!(matches!(
            "BREW".parse::<HttpMethod>(),
            Err(SetupError::UnsupportedMethod(m)) if m == "BREW"
        ));
    }

    #[test]
    fn only_post_put_patch_have_bodies() {
        assert!(HttpMethod::Post.has_body());
        assert!(HttpMethod::Put.has_body());
        assert!(HttpMethod::Patch.has_body());
        assert!(!HttpMethod::Get.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = HttpRequest::new(HttpMethod::Get, "http://localhost/");
        req.set_header("Content-Type", "text/plain");
        req.set_header("X-Trace", "1");
        req.set_header("content-type", "application/json");

        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers[0], ("content-type".to_string(), "application/json".to_string()));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn response_type_accepts_arraybuffer_alias() {
        let t: ResponseType = serde_json::from_str(r#""arraybuffer""#).unwrap();
        assert_eq!(t, ResponseType::Bytes);
        let t: ResponseType = serde_json::from_str(r#""bytes""#).unwrap();
        assert_eq!(t, ResponseType::Bytes);
        let t: ResponseType = serde_json::from_str(r#""text""#).unwrap();
        assert_eq!(t, ResponseType::Text);
    }

    #[test]
    fn browser_only_response_types_fall_back() {
        for (raw, expected) in [
            (r#""blob""#, ResponseType::Bytes),
            (r#""stream""#, ResponseType::Bytes),
            (r#""document""#, ResponseType::Text),
        ] {
            let t: ResponseType = serde_json::from_str(raw).unwrap();
            assert_eq!(t, expected, "{raw}");
        }
    }

    #[test]
    fn response_accessors_match_data_shape() {
        let response = HttpResponse {
            status: 404,
            headers: BTreeMap::from([("content-type".to_string(), "text/plain".to_string())]),
            data: Some(ResponseData::Text("missing".to_string())),
        };
        assert!(!response.is_success());
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.text(), Some("missing"));
        assert!(response.json().is_none());
        assert!(response.bytes().is_none());
    }
}

//! Request descriptor types: body encoding, auth and params.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How POST/PUT/PATCH params are serialized into the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Json,
    #[default]
    UrlEncoded,
    Multipart,
}

impl ContentType {
    /// Unrecognized selectors fall back to urlencoded.
    pub fn from_selector(selector: &str) -> Self {
        match selector {
            "json" => ContentType::Json,
            "multipart" => ContentType::Multipart,
            _ => ContentType::UrlEncoded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Authorization scheme for one request. At most one is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    Bearer(String),
    Basic(BasicCredentials),
}

/// A body already encoded by a form-data collaborator.
///
/// The content type (boundary included) comes from the same collaborator
/// that produced the bytes, so the two always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    content_type: String,
    body: Bytes,
}

impl MultipartBody {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// The `Content-Type` header value, e.g.
    /// `multipart/form-data; boundary=----abc`.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Params sent with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Structured params, encoded per `ContentType` or as a query string.
    Fields(serde_json::Value),
    Multipart(MultipartBody),
}

impl From<serde_json::Value> for Params {
    fn from(value: serde_json::Value) -> Self {
        Params::Fields(value)
    }
}

impl From<MultipartBody> for Params {
    fn from(body: MultipartBody) -> Self {
        Params::Multipart(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_selector_falls_back_to_urlencoded() {
        assert_eq!(ContentType::from_selector("json"), ContentType::Json);
        assert_eq!(ContentType::from_selector("multipart"), ContentType::Multipart);
        assert_eq!(ContentType::from_selector("urlencoded"), ContentType::UrlEncoded);
        assert_eq!(ContentType::from_selector("xml"), ContentType::UrlEncoded);
    }

    #[test]
    fn multipart_body_exposes_its_header() {
        let body = MultipartBody::new("multipart/form-data; boundary=XYZ", b"--XYZ--\r\n".to_vec());
        assert_eq!(body.content_type(), "multipart/form-data; boundary=XYZ");
        assert_eq!(body.body().as_ref(), b"--XYZ--\r\n");
    }
}

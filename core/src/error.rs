//! Error types for the request facade.
//!
//! # Design
//! Only two shapes ever reach a caller. `Transport` means the request went out
//! and no usable response came back. `Unknown` is the synthetic error handed
//! out when the request could not be built or sent; its code and message come
//! from `HttpConfig::unknown_error` and the real cause is only logged.
//!
//! A non-2xx status is not an error at all: it arrives as a normal
//! `HttpResponse` so callers can branch on `status`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code/message pair carried by the synthetic error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No complete response within the timeout; the in-flight request was
    /// cancelled.
    Timeout,
    /// No connection could be established (DNS, refused, TLS).
    Connect,
    /// The redirect limit was exceeded.
    Redirect,
    /// The response body was larger than `max_content_size`.
    BodyTooLarge,
    /// The body stream broke before it completed.
    Body,
    Other,
}

impl TransportErrorKind {
    /// Stable code exposed to callers (and over the C ABI).
    pub fn code(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "TIMEOUT",
            TransportErrorKind::Connect => "CONNECTION_FAILED",
            TransportErrorKind::Redirect => "TOO_MANY_REDIRECTS",
            TransportErrorKind::BodyTooLarge => "MAX_CONTENT_SIZE_EXCEEDED",
            TransportErrorKind::Body => "BODY_INCOMPLETE",
            TransportErrorKind::Other => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The error half of every fetch outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request was dispatched but no response was received.
    #[error("{kind}: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// The request could not be constructed or sent.
    #[error("{}: {}", .0.code, .0.message)]
    Unknown(ErrorInfo),
}

impl FetchError {
    pub fn code(&self) -> &str {
        match self {
            FetchError::Transport { kind, .. } => kind.code(),
            FetchError::Unknown(info) => &info.code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FetchError::Transport { message, .. } => message,
            FetchError::Unknown(info) => &info.message,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Failures while assembling or sending a request. Never returned to
/// callers; logged and replaced by `FetchError::Unknown`.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("unsupported http method {0:?}")]
    UnsupportedMethod(String),

    #[error("params cannot be encoded as {0}")]
    UnsupportedParams(&'static str),

    #[error("multipart content type requires a multipart body")]
    MultipartRequired,

    #[error("multipart body requires the multipart content type on POST, PUT or PATCH")]
    MultipartNotAllowed,

    #[error("json serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to build request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request task failed: {0}")]
    Task(String),
}

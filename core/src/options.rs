//! Per-request options.
//!
//! `FetchOptions` is the typed form used by the Rust API. `OptionsBag` reads
//! the loose option object (snake_case keys, every key optional) that the
//! C surface receives as JSON, and resolves it into `FetchOptions`.

use std::time::Duration;

use serde::Deserialize;

use crate::http::ResponseType;
use crate::types::{Auth, BasicCredentials, ContentType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub request_content_type: ContentType,
    /// Overrides the configured default timeout for this request.
    pub timeout: Option<Duration>,
    pub response_type: ResponseType,
    /// Merged last; wins over every header set internally.
    pub headers: Vec<(String, String)>,
    pub auth: Auth,
    /// Skip cookie forwarding for this request.
    pub without_credentials: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.request_content_type = content_type;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.auth = Auth::Bearer(token.to_string());
        self
    }

    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Auth::Basic(BasicCredentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.without_credentials = true;
        self
    }
}

/// Loose option object. `null` and absent keys mean "not set".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OptionsBag {
    pub request_content_type: Option<String>,
    /// Milliseconds.
    pub timeout: Option<u64>,
    pub response_type: Option<ResponseType>,
    /// Scalar values are sent as their text; `null` entries are skipped.
    pub headers: Option<serde_json::Map<String, serde_json::Value>>,
    pub auth: Option<AuthBag>,
    pub without_credentials: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthBag {
    pub bearer_token: Option<String>,
    pub basic: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AuthBag {
    /// Bearer wins when a token is present; Basic needs a non-empty object.
    /// A missing username or password is sent as an empty string.
    fn resolve(self) -> Auth {
        if let Some(token) = self.bearer_token {
            return Auth::Bearer(token);
        }
        match self.basic {
            Some(basic) if !basic.is_empty() => {
                let field = |name: &str| match basic.get(name) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Auth::Basic(BasicCredentials {
                    username: field("username"),
                    password: field("password"),
                })
            }
            _ => Auth::None,
        }
    }
}

impl From<OptionsBag> for FetchOptions {
    fn from(bag: OptionsBag) -> Self {
        FetchOptions {
            request_content_type: bag
                .request_content_type
                .as_deref()
                .map(ContentType::from_selector)
                .unwrap_or_default(),
            timeout: bag.timeout.map(Duration::from_millis),
            response_type: bag.response_type.unwrap_or_default(),
            headers: bag.headers.map(header_pairs).unwrap_or_default(),
            auth: bag.auth.map(AuthBag::resolve).unwrap_or_default(),
            without_credentials: bag.without_credentials.unwrap_or(false),
        }
    }
}

fn header_pairs(headers: serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    headers
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((name, s)),
            other => Some((name, other.to_string())),
        })
        .collect()
}

impl OptionsBag {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

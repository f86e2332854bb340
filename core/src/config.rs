//! Immutable configuration shared by every `RequestInstance`.
//!
//! # Design
//! Built once and passed around by `Arc`. Overrides are merged at load time:
//! a JSON object using the upper-case key names below is deserialized on top
//! of the defaults, so a partial object only replaces the keys it names.
//! Durations travel as milliseconds; a `TIMEOUT` of `0` means no default
//! timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 50 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("fetch-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HttpConfig {
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub max_redirects: usize,
    /// Largest accepted response body, in bytes.
    pub max_content_size: usize,
    pub user_agent: String,
    /// Copied into every request before anything else is set.
    pub general_headers: BTreeMap<String, String>,
    /// Forward cookies from the instance jar unless a request opts out.
    pub with_credentials: bool,
    pub unknown_error: ErrorInfo,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            general_headers: BTreeMap::new(),
            with_credentials: true,
            unknown_error: ErrorInfo::new("UNKNOWN_ERROR", "Unknown error occurred"),
        }
    }
}

impl HttpConfig {
    /// Merge a JSON override object onto the defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// `None` when the default timeout is disabled.
    pub fn default_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

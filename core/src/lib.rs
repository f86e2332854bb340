//! Convenience facade over an async HTTP client.
//!
//! # Overview
//! `RequestInstance::fetch_json` and `RequestInstance::fetch_data` take a
//! logical request (url, method, params, options), assemble one outgoing
//! request, send it through a lazily created `reqwest::Client`, and resolve
//! to a single `Result<HttpResponse, FetchError>`.
//!
//! # Design
//! - Assembly (`client::build_request`) is pure: headers, auth, body
//!   encoding and query strings are decided before any I/O.
//! - Non-2xx responses are not errors. They come back as `Ok(HttpResponse)`
//!   so callers branch on `status`.
//! - Only two error shapes exist: `FetchError::Transport` when no response
//!   was received, and `FetchError::Unknown` (code and message from
//!   `HttpConfig`) when the request could not be built or sent. The real
//!   cause of the latter is logged, never returned.
//! - No retries, pooling or rate limiting beyond what `reqwest` does.

pub mod auth;
pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod http;
pub mod instance;
pub mod options;
pub mod types;

pub use client::{build_request, parse_response};
pub use config::HttpConfig;
pub use error::{ErrorInfo, FetchError, SetupError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseData, ResponseType};
pub use instance::RequestInstance;
pub use options::{FetchOptions, OptionsBag};
pub use types::{Auth, BasicCredentials, ContentType, MultipartBody, Params};

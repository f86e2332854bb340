//! Authorization header injectors.
//!
//! Both take the request being assembled and return it, with `Authorization`
//! set when a payload is given and untouched otherwise.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::http::HttpRequest;
use crate::types::BasicCredentials;

pub const AUTHORIZATION: &str = "Authorization";

pub fn set_auth_bearer(mut request: HttpRequest, token: Option<&str>) -> HttpRequest {
    if let Some(token) = token {
        request.set_header(AUTHORIZATION, &format!("Bearer {token}"));
    }
    request
}

/// `Basic base64(username:password)`.
pub fn set_auth_basic(mut request: HttpRequest, credentials: Option<&BasicCredentials>) -> HttpRequest {
    if let Some(BasicCredentials { username, password }) = credentials {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        request.set_header(AUTHORIZATION, &format!("Basic {encoded}"));
    }
    request
}

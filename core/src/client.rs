//! Request assembly and response normalization.
//!
//! # Design
//! `build_request` turns a request descriptor into a finished `HttpRequest`
//! without touching the network, and `parse_response` turns a status, header
//! map and body into an `HttpResponse`. Everything between the two is the
//! dispatch in `instance`, so the rules for headers, auth and body encoding
//! are testable on their own.
//!
//! Header precedence, lowest to highest: configured general headers, auth,
//! `Accept` for json responses, `Content-Type` for bodies, caller headers.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::auth::{set_auth_basic, set_auth_bearer};
use crate::config::HttpConfig;
use crate::encode::{append_query, json_body, parse_json_body, urlencoded_body};
use crate::error::SetupError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseData, ResponseType};
use crate::options::FetchOptions;
use crate::types::{Auth, ContentType, Params};

pub const ACCEPT: &str = "Accept";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Assemble one outgoing request.
pub fn build_request(
    config: &HttpConfig,
    url: &str,
    method: HttpMethod,
    params: Option<&Params>,
    options: &FetchOptions,
) -> Result<HttpRequest, SetupError> {
    let mut target = Url::parse(url).map_err(|source| SetupError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    let mut request = HttpRequest::new(method, url);
    for (name, value) in &config.general_headers {
        request.set_header(name, value);
    }
    request.response_type = options.response_type;
    request.with_credentials = config.with_credentials && !options.without_credentials;
    request.timeout = options.timeout;

    request = match &options.auth {
        Auth::None => request,
        Auth::Bearer(token) => set_auth_bearer(request, Some(token)),
        Auth::Basic(credentials) => set_auth_basic(request, Some(credentials)),
    };

    if options.response_type == ResponseType::Json {
        request.set_header(ACCEPT, APPLICATION_JSON);
    }

    if method.has_body() {
        match options.request_content_type {
            ContentType::Json => {
                request.set_header(CONTENT_TYPE, APPLICATION_JSON);
                if let Some(params) = params {
                    request.body = Some(json_body(fields(params)?)?);
                }
            }
            ContentType::Multipart => match params {
                Some(Params::Multipart(form)) => {
                    request.set_header(CONTENT_TYPE, form.content_type());
                    request.body = Some(form.body().clone());
                }
                _ => return Err(SetupError::MultipartRequired),
            },
            ContentType::UrlEncoded => {
                request.set_header(CONTENT_TYPE, FORM_URLENCODED);
                if let Some(params) = params {
                    request.body = Some(Bytes::from(urlencoded_body(fields(params)?)?));
                }
            }
        }
    } else if let Some(params) = params {
        append_query(&mut target, fields(params)?)?;
    }
    request.url = target.into();

    for (name, value) in &options.headers {
        request.set_header(name, value);
    }
    validate_headers(&request)?;

    Ok(request)
}

/// Normalize a received response. Header names come out lower-cased.
pub fn parse_response(
    status: u16,
    headers: &HeaderMap,
    body: Bytes,
    response_type: ResponseType,
) -> HttpResponse {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match flat.entry(name.as_str().to_ascii_lowercase()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value.into_owned());
            }
        }
    }

    let data = if body.is_empty() {
        None
    } else {
        match response_type {
            ResponseType::Json => parse_json_body(&body).map(ResponseData::Json),
            ResponseType::Text => Some(ResponseData::Text(String::from_utf8_lossy(&body).into_owned())),
            ResponseType::Bytes => Some(ResponseData::Bytes(body)),
        }
    };

    HttpResponse {
        status,
        headers: flat,
        data,
    }
}

fn fields(params: &Params) -> Result<&serde_json::Value, SetupError> {
    match params {
        Params::Fields(value) => Ok(value),
        Params::Multipart(_) => Err(SetupError::MultipartNotAllowed),
    }
}

fn validate_headers(request: &HttpRequest) -> Result<(), SetupError> {
    for (name, value) in &request.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            return Err(SetupError::InvalidHeader { name: name.clone() });
        }
    }
    Ok(())
}

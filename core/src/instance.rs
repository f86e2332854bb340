//! The request facade: one `RequestInstance` per logical session.
//!
//! # Design
//! The instance caches one `reqwest::Client`, built on first use from the
//! shared `HttpConfig` and reused by every later call, concurrent ones
//! included. Concurrency safety of that handle is whatever `reqwest::Client`
//! provides; this type adds no locking of its own beyond the one-time
//! initialization.
//!
//! Each fetch runs its round trip on a spawned tokio task tied to a
//! `CancellationToken`, and races that task against the effective timeout
//! (the request override, else `HttpConfig::timeout`). When the deadline wins,
//! the token is cancelled, which drops the pending `reqwest` future and closes
//! its connection. Dropping the fetch future cancels the token the same way.
//! Other transport failures end the round trip on their own. Must be called
//! from within a tokio runtime.
//!
//! Every call resolves to exactly one of:
//! - `Ok(HttpResponse)` for any status code, non-2xx included;
//! - `Err(FetchError::Transport)` when no response was received;
//! - `Err(FetchError::Unknown)` when the request could not be built or sent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use crate::client::{build_request, parse_response};
use crate::config::HttpConfig;
use crate::error::{FetchError, SetupError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseType};
use crate::options::FetchOptions;
use crate::types::Params;

/// `Accept` sent when a request does not set its own.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

pub struct RequestInstance {
    config: Arc<HttpConfig>,
    client: OnceCell<reqwest::Client>,
    cookies: Arc<Jar>,
    created: Instant,
}

impl RequestInstance {
    pub fn new(config: Arc<HttpConfig>) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            cookies: Arc::new(Jar::default()),
            created: Instant::now(),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Whether the HTTP client has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Fetch `url`, delivering the body in `options.response_type` (JSON by
    /// default).
    pub async fn fetch_json(
        &self,
        url: &str,
        method: HttpMethod,
        params: Option<Params>,
        options: FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        match build_request(&self.config, url, method, params.as_ref(), &options) {
            Ok(request) => self.fetch(request).await,
            Err(cause) => Err(self.setup_failure(url, cause)),
        }
    }

    /// `fetch_json` with the body delivered as raw bytes.
    pub async fn fetch_data(
        &self,
        url: &str,
        method: HttpMethod,
        params: Option<Params>,
        mut options: FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        options.response_type = ResponseType::Bytes;
        self.fetch_json(url, method, params, options).await
    }

    /// Dispatch an already assembled request.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let url = request.url.clone();
        let request_id = request.id;
        debug!(
            %request_id,
            method = %request.method,
            url = %request.url,
            headers = ?request.headers.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            body_len = request.body.as_ref().map_or(0, Bytes::len),
            "HTTP raw request"
        );

        let client = match self.client().await {
            Ok(client) => client.clone(),
            Err(cause) => return Err(self.setup_failure(&url, cause)),
        };

        debug!(%request_id, elapsed_ms = self.elapsed_ms(), "HTTP fetch start");
        let timeout = request.timeout.or_else(|| self.config.default_timeout());
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let exchange = Exchange {
            client,
            cookies: Arc::clone(&self.cookies),
            max_content_size: self.config.max_content_size,
        };
        let mut task = tokio::spawn(exchange.run(request, cancel.clone()));
        let finished = tokio::select! {
            joined = &mut task => Some(joined),
            _ = deadline(timeout) => None,
        };
        let joined = match finished {
            Some(joined) => joined,
            None => {
                cancel.cancel();
                let _ = task.await;
                debug!(%request_id, "cancelled in-flight request after timeout");
                Ok(Err(ExchangeError::Transport {
                    kind: TransportErrorKind::Timeout,
                    message: format!(
                        "no response within {} ms",
                        timeout.map_or(0, |t| t.as_millis())
                    ),
                }))
            }
        };
        let _ = guard.disarm();
        debug!(%request_id, elapsed_ms = self.elapsed_ms(), "HTTP fetch end");

        match joined {
            Ok(Ok(response)) => {
                debug!(
                    %request_id,
                    status = response.status,
                    headers = response.headers.len(),
                    has_data = response.data.is_some(),
                    "HTTP raw response"
                );
                Ok(response)
            }
            Ok(Err(ExchangeError::Transport { kind, message })) => {
                debug!(%request_id, %kind, %message, "HTTP fetch failed without response");
                Err(FetchError::Transport { kind, message })
            }
            Ok(Err(ExchangeError::Setup(cause))) => Err(self.setup_failure(&url, cause)),
            Ok(Err(ExchangeError::Cancelled)) => {
                Err(self.setup_failure(&url, SetupError::Task("exchange cancelled".to_string())))
            }
            Err(join_error) => Err(self.setup_failure(&url, SetupError::Task(join_error.to_string()))),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, SetupError> {
        self.client
            .get_or_try_init(|| async { build_client(&self.config) })
            .await
    }

    /// Log the real cause and hand out the configured generic error.
    fn setup_failure(&self, url: &str, cause: SetupError) -> FetchError {
        error!(error = %cause, %url, "HTTP fetch setup failed");
        FetchError::Unknown(self.config.unknown_error.clone())
    }

    fn elapsed_ms(&self) -> u64 {
        self.created.elapsed().as_millis() as u64
    }
}

fn build_client(config: &HttpConfig) -> Result<reqwest::Client, SetupError> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

    reqwest::Client::builder()
        .redirect(Policy::limited(config.max_redirects))
        .user_agent(config.user_agent.as_str())
        .default_headers(default_headers)
        .build()
        .map_err(SetupError::Client)
}

enum ExchangeError {
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    Setup(SetupError),
    /// The token fired before the round trip finished.
    Cancelled,
}

/// Resolves once `timeout` has elapsed; never, when there is none.
async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Everything the spawned round trip needs, owned.
struct Exchange {
    client: reqwest::Client,
    cookies: Arc<Jar>,
    max_content_size: usize,
}

impl Exchange {
    async fn run(self, request: HttpRequest, cancel: CancellationToken) -> Result<HttpResponse, ExchangeError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
            outcome = self.round_trip(request) => outcome,
        }
    }

    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, ExchangeError> {
        let target = Url::parse(&request.url).map_err(|source| {
            ExchangeError::Setup(SetupError::InvalidUrl {
                url: request.url.clone(),
                source,
            })
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let invalid = || ExchangeError::Setup(SetupError::InvalidHeader { name: name.clone() });
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }
        if request.with_credentials && !headers.contains_key(COOKIE) {
            if let Some(cookie) = self.cookies.cookies(&target) {
                headers.insert(COOKIE, cookie);
            }
        }

        let mut builder = self
            .client
            .request(request.method.into(), target)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let outbound = builder
            .build()
            .map_err(|e| ExchangeError::Setup(SetupError::Request(e)))?;

        let mut response = self.client.execute(outbound).await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        if request.with_credentials {
            let mut set_cookies = headers.get_all(SET_COOKIE).iter();
            self.cookies.set_cookies(&mut set_cookies, response.url());
        }

        let body = read_body(&mut response, self.max_content_size).await?;
        Ok(parse_response(status, &headers, body, request.response_type))
    }
}

/// Stream the body, failing as soon as it outgrows `limit`.
async fn read_body(response: &mut reqwest::Response, limit: usize) -> Result<Bytes, ExchangeError> {
    let too_large = || ExchangeError::Transport {
        kind: TransportErrorKind::BodyTooLarge,
        message: format!("max content size of {limit} bytes exceeded"),
    };
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(classify)? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn classify(err: reqwest::Error) -> ExchangeError {
    if err.is_builder() {
        return ExchangeError::Setup(SetupError::Request(err));
    }
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_redirect() {
        TransportErrorKind::Redirect
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Other
    };
    ExchangeError::Transport {
        kind,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;
    use serde_json::json;

    #[test]
    fn new_instance_is_lazy() {
        let instance = RequestInstance::new(Arc::new(HttpConfig::default()));
        assert!(!instance.is_initialized());
        assert_eq!(instance.config().max_redirects, HttpConfig::default().max_redirects);
    }

    #[test]
    fn client_builds_from_default_config() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn client_build_rejects_invalid_user_agent() {
        let config = HttpConfig {
            user_agent: "bad\nagent".to_string(),
            ..HttpConfig::default()
        };
        assert!(matches!(build_client(&config), Err(SetupError::Client(_))));
    }

    #[tokio::test]
    async fn deadline_fires_only_with_a_timeout() {
        let short = tokio::time::timeout(Duration::from_secs(1), deadline(Some(Duration::from_millis(10)))).await;
        assert!(short.is_ok());
        let none = tokio::time::timeout(Duration::from_millis(50), deadline(None)).await;
        assert!(none.is_err());
    }

    #[tokio::test]
    async fn setup_failure_yields_configured_unknown_error() {
        let config = HttpConfig::from_json(r#"{"UNKNOWN_ERROR":{"code":"E_SETUP","message":"cannot send"}}"#).unwrap();
        let instance = RequestInstance::new(Arc::new(config));

        let err = instance
            .fetch_json("not a url", HttpMethod::Get, None, FetchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Unknown(crate::error::ErrorInfo::new("E_SETUP", "cannot send")));
        assert!(!instance.is_initialized());
    }

    #[tokio::test]
    async fn multipart_selector_without_form_is_unknown_error() {
        let instance = RequestInstance::new(Arc::new(HttpConfig::default()));
        let options = FetchOptions::new().content_type(ContentType::Multipart);

        let err = instance
            .fetch_json(
                "http://127.0.0.1:9/upload",
                HttpMethod::Post,
                Some(Params::Fields(json!({"a": "1"}))),
                options,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unknown(_)));
    }

    #[tokio::test]
    async fn invalid_user_agent_surfaces_as_unknown_error() {
        let config = HttpConfig {
            user_agent: "bad\nagent".to_string(),
            ..HttpConfig::default()
        };
        let instance = RequestInstance::new(Arc::new(config));

        let err = instance
            .fetch_json("http://127.0.0.1:9/", HttpMethod::Get, None, FetchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_ERROR");
    }
}

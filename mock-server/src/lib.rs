use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    /// Lower-cased names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// How a `/hold/{id}/{ms}` request ended, as seen by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldState {
    Waiting,
    /// The handler was dropped before it answered: the client went away.
    Abandoned,
    Completed,
}

/// Shared record of `/hold` requests, keyed by the caller-chosen id.
#[derive(Clone, Default)]
pub struct Holds(Arc<Mutex<BTreeMap<String, HoldState>>>);

impl Holds {
    fn set(&self, id: &str, state: HoldState) {
        if let Ok(mut holds) = self.0.lock() {
            holds.insert(id.to_string(), state);
        }
    }

    fn get(&self, id: &str) -> Option<HoldState> {
        self.0.lock().ok().and_then(|holds| holds.get(id).copied())
    }
}

/// Marks its hold abandoned unless the handler reached the end.
struct HoldGuard {
    holds: Holds,
    id: String,
    completed: bool,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let state = if self.completed {
            HoldState::Completed
        } else {
            HoldState::Abandoned
        };
        self.holds.set(&self.id, state);
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/malformed", get(malformed))
        .route("/text", get(text))
        .route("/empty", get(empty))
        .route("/delay/{ms}", get(delay))
        .route("/bytes/{len}", get(bytes))
        .route("/redirect/{hops}", get(redirect))
        .route("/cookies", get(cookies))
        .route("/cookies/set/{name}/{value}", get(set_cookie))
        .route("/hold/{id}/{ms}", get(hold))
        .route("/holds/{id}", get(hold_state))
        .with_state(Holds::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value.clone());
    }
    Json(Echo {
        method: method.to_string(),
        query,
        headers: flat,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, Json(json!({ "status": code }))).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{not json")
}

async fn text() -> &'static str {
    "hello from mock-server"
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn delay(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "delayed_ms": ms }))
}

async fn bytes(Path(len): Path<usize>) -> impl IntoResponse {
    let body: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
    ([(header::CONTENT_TYPE, "application/octet-stream")], body)
}

/// Redirects `hops` times before landing on `/echo`.
async fn redirect(Path(hops): Path<u32>) -> Redirect {
    if hops == 0 {
        Redirect::to("/echo")
    } else {
        Redirect::to(&format!("/redirect/{}", hops - 1))
    }
}

async fn cookies(headers: HeaderMap) -> Json<serde_json::Value> {
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    Json(json!({ "cookie": cookie }))
}

async fn set_cookie(Path((name, value)): Path<(String, String)>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, format!("{name}={value}; Path=/"))],
        Json(json!({ "set": name })),
    )
}

/// Like `/delay`, but records whether the client waited for the answer.
async fn hold(State(holds): State<Holds>, Path((id, ms)): Path<(String, u64)>) -> Json<serde_json::Value> {
    holds.set(&id, HoldState::Waiting);
    let mut guard = HoldGuard {
        holds,
        id,
        completed: false,
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
    guard.completed = true;
    Json(json!({ "held_ms": ms }))
}

async fn hold_state(State(holds): State<Holds>, Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "state": holds.get(&id) }))
}

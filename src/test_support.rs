//! In-process mock of the realty backend for unit tests

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum RefreshMode {
    /// Issue this (access, refresh) pair; the access token becomes valid.
    Issue(&'static str, &'static str),
    /// Answer with this status and a `{detail}` body.
    Reject(u16),
}

#[derive(Default)]
struct Inner {
    valid_tokens: HashSet<String>,
    reject_all: bool,
    refresh_mode: Option<RefreshMode>,
    refresh_delay: Duration,
    refresh_tokens_seen: Vec<String>,
    /// (method, path, authorization header) for every resource request
    resource_requests: Vec<(String, String, Option<String>)>,
    bodies: HashMap<String, Vec<Value>>,
    me: Option<Value>,
}

#[derive(Clone, Default)]
struct MockState {
    inner: Arc<Mutex<Inner>>,
}

impl MockState {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    fn bearer_ok(&self, headers: &HeaderMap) -> bool {
        let token = bearer(headers);
        self.with(|inner| {
            !inner.reject_all && token.is_some_and(|t| inner.valid_tokens.contains(&t))
        })
    }

    fn accept_token(&self, token: &str) {
        self.with(|inner| inner.valid_tokens.insert(token.to_string()));
    }

    fn record_body(&self, path: &str, body: &Value) {
        self.with(|inner| {
            inner
                .bodies
                .entry(path.to_string())
                .or_default()
                .push(body.clone());
        });
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

pub struct MockBackend {
    base_url: String,
    state: MockState,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = MockState::default();

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/me", get(me))
            .route("/auth/register", post(register))
            .route("/auth/confirm-signup", post(confirm_signup))
            .route("/auth/resend-confirmation", post(resend_confirmation))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/auth/reset-password", post(reset_password))
            .route("/auth/set-password", post(set_password))
            .fallback(resource)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn accept_token(&self, token: &str) {
        self.state.accept_token(token);
    }

    /// Answer 401 to every resource request, whatever the token.
    pub fn reject_all(&self) {
        self.state.with(|inner| inner.reject_all = true);
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        self.state.with(|inner| inner.refresh_mode = Some(mode));
    }

    /// Body served by `/auth/me` to an authenticated caller
    pub fn set_me(&self, user: Value) {
        self.state.with(|inner| inner.me = Some(user));
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.with(|inner| inner.refresh_delay = delay);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.with(|inner| inner.refresh_tokens_seen.len())
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.state.with(|inner| inner.refresh_tokens_seen.clone())
    }

    /// Authorization headers seen on resource requests, in order
    pub fn resource_authorizations(&self) -> Vec<Option<String>> {
        self.state.with(|inner| {
            inner
                .resource_requests
                .iter()
                .map(|(_, _, auth)| auth.clone())
                .collect()
        })
    }

    pub fn resource_requests(&self) -> Vec<(String, String)> {
        self.state.with(|inner| {
            inner
                .resource_requests
                .iter()
                .map(|(method, path, _)| (method.clone(), path.clone()))
                .collect()
        })
    }

    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.state
            .with(|inner| inner.bodies.get(path).cloned().unwrap_or_default())
    }
}

async fn login(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/login", &body);
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let role = body["role"].as_str().unwrap_or_default();

    match (email, password, role) {
        ("agent@example.com", "secret", "agent") => {
            state.accept_token("LA");
            Json(json!({
                "access_token": "LA",
                "refresh_token": "LR",
                "role": "agent",
                "user": { "id": 1, "email": email, "role": "agent", "name": "Avery Agent" }
            }))
            .into_response()
        }
        ("broker@example.com", "secret", "agent") => {
            state.accept_token("BA");
            Json(json!({
                "access_token": "BA",
                "refresh_token": "BR",
                "role": "Agent",
                "user": { "id": 2, "email": email, "role": "Agent", "name": null }
            }))
            .into_response()
        }
        ("client@example.com", "secret", "client") => {
            state.accept_token("LC");
            Json(json!({ "access_token": "LC", "refresh_token": "LCR", "role": "client" }))
                .into_response()
        }
        _ => detail(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn refresh(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let token = body["refresh_token"].as_str().unwrap_or_default().to_string();
    let (mode, delay) = state.with(|inner| {
        inner.refresh_tokens_seen.push(token);
        (inner.refresh_mode, inner.refresh_delay)
    });

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match mode {
        Some(RefreshMode::Issue(access, refresh)) => {
            state.accept_token(access);
            Json(json!({ "access_token": access, "refresh_token": refresh })).into_response()
        }
        Some(RefreshMode::Reject(code)) => detail(
            StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST),
            "Invalid refresh token",
        ),
        None => detail(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
    }
}

async fn me(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if state.bearer_ok(&headers) {
        let user = state
            .with(|inner| inner.me.clone())
            .unwrap_or_else(|| json!({ "id": 1, "email": "agent@example.com", "role": "agent" }));
        Json(user).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Not authenticated")
    }
}

async fn register(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/register", &body);
    if body["email"] == "taken@example.com" {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    Json(json!({ "pending_token": "pt-1", "detail": "Confirmation code sent" })).into_response()
}

async fn confirm_signup(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/confirm-signup", &body);
    if body["pending_token"] == "pt-1" && body["code"] == "123456" {
        Json(json!({ "detail": "Account confirmed" })).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Invalid confirmation code")
    }
}

async fn resend_confirmation(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/resend-confirmation", &body);
    if body["pending_token"] == "pt-1" {
        Json(json!({ "detail": "Confirmation code re-sent" })).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Unknown signup")
    }
}

async fn forgot_password(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/forgot-password", &body);
    Json(json!({ "reset_token": "rt-1", "detail": "Reset code sent" })).into_response()
}

async fn reset_password(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/reset-password", &body);
    if body["reset_token"] == "rt-1" && body["code"] == "654321" {
        Json(json!({ "detail": "Password updated" })).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Invalid or expired reset code")
    }
}

async fn set_password(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.record_body("/auth/set-password", &body);
    match body["token"].as_str() {
        Some("invite-1") => {
            state.accept_token("IA");
            Json(json!({ "access_token": "IA", "refresh_token": "IR" })).into_response()
        }
        Some("invite-2") => Json(json!({ "detail": "Password set" })).into_response(),
        _ => detail(StatusCode::BAD_REQUEST, "Invite link is invalid or expired"),
    }
}

async fn resource(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.with(|inner| {
        inner
            .resource_requests
            .push((method.to_string(), path.clone(), authorization));
    });

    if !state.bearer_ok(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    if path.ends_with("/404") {
        return detail(StatusCode::NOT_FOUND, "Not found");
    }
    if method == Method::DELETE {
        return StatusCode::NO_CONTENT.into_response();
    }

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "path": path,
        "query": uri.query(),
        "body": body,
    }))
    .into_response()
}

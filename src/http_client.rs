//! Authenticated HTTP client with the retry-once-on-401 protocol

use crate::error::{ClientError, Result};
use crate::session::SessionManager;
use crate::types::TokenKind;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An outgoing API call
///
/// Kept as data rather than a `reqwest::RequestBuilder` so it can be re-sent
/// with a fresh token after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    /// Set once the request has been re-sent after a refresh; a second 401
    /// is then passed through instead of refreshing again.
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Single point of outbound request configuration
///
/// Attaches the active role's bearer token to every request and recovers
/// from one expired-token 401 per request by refreshing through the
/// [`SessionManager`].
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send a request and return the raw response.
    ///
    /// Non-401 responses, and a 401 on an already retried request, come back
    /// unchanged. A first 401 triggers one refresh and one re-send; if the
    /// refresh fails the role is logged out and
    /// [`ClientError::Unauthorized`] carries the original 401 body. Without
    /// a refresh token the original 401 response is returned as is.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<Response> {
        let store = self.session.token_store();
        let role = store.get_active_role();
        let access_token = store.get_token(role, TokenKind::Access);

        let response = self.dispatch(&request, access_token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.retried {
            return Ok(response);
        }

        request.retried = true;

        let role = store.resolve_active_role();
        if store.get_token(role, TokenKind::Refresh).is_none() {
            debug!(role = %role, path = %request.path, "401 without refresh token, passing through");
            return Ok(response);
        }

        match self.session.refresh(role).await {
            Ok(pair) => {
                info!(role = %role, path = %request.path, "Retrying request with refreshed token");
                self.dispatch(&request, Some(&pair.access_token)).await
            }
            Err(e) => {
                warn!(role = %role, path = %request.path, error = %e, "Refresh failed, giving up on request");
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::Unauthorized {
                    role,
                    detail: crate::error::extract_detail(&text),
                })
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: Option<&str>) -> Result<Response> {
        let url = self.session.config().url(&request.path);
        let mut builder = self.session.http().request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, authenticated = access_token.is_some(), "Sending request");
        Ok(builder.send().await?)
    }

    /// Execute and decode a JSON success body; other statuses become
    /// [`ClientError::Api`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        check_response!(response);
        Ok(response.json().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::patch(path).json(body)?).await
    }

    /// DELETE, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.execute(ApiRequest::delete(path)).await?;
        check_response!(response);
        Ok(())
    }
}

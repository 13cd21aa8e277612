//! Account lifecycle calls: signup, confirmation, password reset, invites
//!
//! Multi-step flows hand back a [`FlowToken`] that the caller passes into
//! the next step. Nothing about an unfinished flow is kept in the token
//! store, so two tabs or two flows cannot pick up each other's state.

use crate::error::{ClientError, Result};
use crate::session::SessionManager;
use crate::types::{FlowToken, Role, TokenPair};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Success body of the account endpoints
#[derive(Debug, Default, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    pending_token: Option<FlowToken>,
    #[serde(default)]
    reset_token: Option<FlowToken>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Calls the unauthenticated `/auth/*` account endpoints
#[derive(Clone)]
pub struct AccountClient {
    session: Arc<SessionManager>,
}

impl AccountClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<AccountResponse> {
        debug!(path = %path, "Account request");
        let response = self
            .session
            .http()
            .post(self.session.config().url(path))
            .json(body)
            .send()
            .await?;

        check_response!(response);

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(AccountResponse::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Start a signup. The returned token identifies the pending account in
    /// [`confirm_signup`](Self::confirm_signup) and
    /// [`resend_confirmation`](Self::resend_confirmation).
    pub async fn register(&self, request: &RegisterRequest) -> Result<FlowToken> {
        let resp = self.post("/auth/register", request).await?;
        let token = resp.pending_token.ok_or_else(|| {
            ClientError::InvalidResponse("register response carries no pending_token".to_string())
        })?;
        info!(role = %request.role, "Signup started");
        Ok(token)
    }

    pub async fn confirm_signup(&self, flow: &FlowToken, code: &str) -> Result<Option<String>> {
        let body = serde_json::json!({ "pending_token": flow, "code": code });
        let resp = self.post("/auth/confirm-signup", &body).await?;
        info!("Signup confirmed");
        Ok(resp.detail)
    }

    pub async fn resend_confirmation(&self, flow: &FlowToken) -> Result<Option<String>> {
        let body = serde_json::json!({ "pending_token": flow });
        Ok(self.post("/auth/resend-confirmation", &body).await?.detail)
    }

    /// Request a reset code. The returned token continues the flow in
    /// [`reset_password`](Self::reset_password).
    pub async fn forgot_password(&self, email: &str) -> Result<FlowToken> {
        let body = serde_json::json!({ "email": email });
        self.post("/auth/forgot-password", &body)
            .await?
            .reset_token
            .ok_or_else(|| {
                ClientError::InvalidResponse(
                    "forgot-password response carries no reset_token".to_string(),
                )
            })
    }

    /// Finish a reset. Any stored session for `role` is dropped so the user
    /// signs in again with the new password.
    pub async fn reset_password(
        &self,
        flow: &FlowToken,
        code: &str,
        new_password: &str,
        role: Role,
    ) -> Result<Option<String>> {
        let body = serde_json::json!({
            "reset_token": flow,
            "code": code,
            "new_password": new_password,
        });
        let resp = self.post("/auth/reset-password", &body).await?;
        self.session.token_store().clear_pair(role);
        info!(role = %role, "Password reset");
        Ok(resp.detail)
    }

    /// Accept an invite by choosing a password.
    ///
    /// Stale tokens for `role` are removed before the call. When the server
    /// answers with a token pair, a new session is established for `role`.
    pub async fn set_password(
        &self,
        invite_token: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<TokenPair>> {
        self.session.token_store().clear_pair(role);

        let body = serde_json::json!({
            "token": invite_token,
            "password": password,
            "role": role,
        });
        let resp = self.post("/auth/set-password", &body).await?;

        match (resp.access_token, resp.refresh_token) {
            (Some(access_token), Some(refresh_token)) => {
                let pair = TokenPair::new(access_token, refresh_token);
                self.session.establish(role, &pair);
                Ok(Some(pair))
            }
            _ => Ok(None),
        }
    }
}

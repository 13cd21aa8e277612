//! Session manager: owns the token store and performs token refreshes

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::navigator::Navigator;
use crate::token_store::TokenStore;
use crate::types::{RefreshRequest, RefreshResponse, Role, TokenKind, TokenPair};
use async_singleflight::Group;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns both roles' token pairs and serializes their refreshes
///
/// Reactive refreshes (a request saw 401) and proactive ones (the background
/// refresher) go through the same [`refresh`](Self::refresh) call, so two
/// triggers for one role never race each other against refresh-token
/// rotation on the server.
pub struct SessionManager {
    config: ClientConfig,
    token_store: TokenStore,
    navigator: Arc<dyn Navigator>,
    http_client: Client,
    /// Singleflight group keyed by role name. Only one refresh per role is in
    /// flight; late callers wait for and share its outcome.
    /// Error type is String because singleflight requires shared error type
    refresh_singleflight: Group<TokenPair, String>,
}

impl SessionManager {
    /// Create a new session manager
    ///
    /// # Arguments
    /// * `config` - Client configuration (base URL, login paths, timeouts)
    /// * `token_store` - Where both roles' tokens are persisted
    /// * `navigator` - Receives the login redirect when a session is lost
    pub fn new(
        config: ClientConfig,
        token_store: TokenStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Arc::new(Self {
            config,
            token_store,
            navigator,
            http_client,
            refresh_singleflight: Group::new(),
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the token store (for advanced usage)
    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Raw transport without bearer injection or refresh handling
    pub fn http(&self) -> &Client {
        &self.http_client
    }

    /// Persist a freshly issued pair and make `role` the active one.
    pub fn establish(&self, role: Role, pair: &TokenPair) {
        self.token_store.set_pair(role, pair);
        self.token_store.set_active_role(role);
        info!(role = %role, "Session established");
    }

    /// Drop the role's tokens and send the user to that role's login page.
    pub fn expire(&self, role: Role) {
        self.token_store.clear_pair(role);
        let path = self.config.login_path(role);
        warn!(role = %role, path = %path, "Session expired, redirecting to login");
        self.navigator.navigate(path);
    }

    /// Exchange the role's refresh token for a new pair.
    ///
    /// Concurrent calls for the same role share one network request. On any
    /// failure (no refresh token, transport error, rejection) the role's pair
    /// is removed and the navigator is sent to its login page, once per
    /// flight.
    pub async fn refresh(&self, role: Role) -> Result<TokenPair> {
        let (success_opt, error_opt, shared) = self
            .refresh_singleflight
            .work(role.as_str(), async {
                match self.do_refresh(role).await {
                    Ok(pair) => Ok(pair),
                    Err(e) => {
                        let err_msg = e.to_string();
                        warn!(role = %role, error = %err_msg, "Token refresh failed");
                        self.expire(role);
                        Err(err_msg)
                    }
                }
            })
            .await;

        if shared {
            debug!(role = %role, "Joined in-flight token refresh");
        }

        match (success_opt, error_opt) {
            (Some(pair), None) => Ok(pair),
            (None, Some(err_str)) => Err(ClientError::Authentication(err_str)),
            _ => Err(ClientError::Authentication(
                "Unknown error during token refresh".to_string(),
            )),
        }
    }

    async fn do_refresh(&self, role: Role) -> Result<TokenPair> {
        let refresh_token = self
            .token_store
            .get_token(role, TokenKind::Refresh)
            .ok_or(ClientError::MissingRefreshToken(role))?;

        let response = self
            .http_client
            .post(self.config.url("/auth/refresh"))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Authentication(format!(
                "Refresh rejected with status {}: {}",
                status,
                crate::error::extract_detail(&error_text)
            )));
        }

        let pair: TokenPair = response.json::<RefreshResponse>().await?.into();
        self.token_store.set_pair(role, &pair);
        info!(role = %role, "Access token refreshed successfully");

        Ok(pair)
    }
}

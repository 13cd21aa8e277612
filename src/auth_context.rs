//! Application-wide authentication state
//!
//! Holds the current user and a loading flag behind a `watch` channel so any
//! part of the UI can observe changes. The user is kept in memory only and is
//! never used for authorization; the server decides that.

use crate::error::Result;
use crate::refresher::{RefresherHandle, SessionRefresher};
use crate::session::SessionManager;
use crate::types::{AuthUser, LoginRequest, LoginResponse, Role, TokenKind, TokenPair};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<AuthUser>,
    pub loading: bool,
}

impl Default for AuthState {
    /// Nothing is known until [`AuthContext::bootstrap`] has run.
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owns the observable state and the background refresher of one session.
/// Dropping the context stops the refresher.
pub struct AuthContext {
    session: Arc<SessionManager>,
    state: watch::Sender<AuthState>,
    refresher: Mutex<Option<RefresherHandle>>,
}

impl AuthContext {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            session,
            state,
            refresher: Mutex::new(None),
        }
    }

    /// Start the background refresher on the configured interval.
    pub fn start_refresher(&self) {
        self.attach_refresher(SessionRefresher::new(self.session.clone()).start());
    }

    /// Hand a running refresher to the context; any previous one is stopped.
    pub fn attach_refresher(&self, handle: RefresherHandle) {
        let previous = self.lock_refresher().replace(handle);
        drop(previous);
    }

    pub fn stop_refresher(&self) {
        let handle = self.lock_refresher().take();
        if let Some(mut handle) = handle {
            handle.stop();
        }
    }

    pub fn refresher_running(&self) -> bool {
        self.lock_refresher()
            .as_ref()
            .is_some_and(RefresherHandle::is_running)
    }

    fn lock_refresher(&self) -> std::sync::MutexGuard<'_, Option<RefresherHandle>> {
        match self.refresher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    fn settle(&self, user: Option<AuthUser>) {
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
    }

    /// Validate the stored access token against `GET /auth/me`.
    ///
    /// Always ends with `loading == false`. A token the server rejects, or
    /// one that cannot be checked, is removed from the store.
    pub async fn bootstrap(&self) -> AuthState {
        let store = self.session.token_store();
        let role = store.get_active_role();

        let Some(access_token) = store.get_token(role, TokenKind::Access) else {
            debug!(role = %role, "No stored access token, starting unauthenticated");
            self.settle(None);
            return self.state();
        };

        match self.fetch_me(&access_token).await {
            Ok(user) => {
                info!(role = %role, "Restored authenticated session");
                self.settle(Some(user));
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Stored access token rejected");
                store.clear_token(role, TokenKind::Access);
                self.settle(None);
            }
        }

        self.state()
    }

    async fn fetch_me(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .session
            .http()
            .get(self.session.config().url("/auth/me"))
            .bearer_auth(access_token)
            .send()
            .await?;

        check_response!(response);

        Ok(response.json().await?)
    }

    /// Log in as `role`.
    ///
    /// On success the pair is persisted, `role` becomes the active role and
    /// the user is set from the response (or from the submitted credentials
    /// when the server sends none). On failure nothing is stored.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<AuthUser> {
        let response = self
            .session
            .http()
            .post(self.session.config().url("/auth/login"))
            .json(&LoginRequest {
                email,
                password,
                role,
            })
            .send()
            .await?;

        check_response!(response);

        let login: LoginResponse = response.json().await?;
        let role = login.role.unwrap_or(role);
        self.session.establish(
            role,
            &TokenPair::new(login.access_token, login.refresh_token),
        );

        let user = login.user.unwrap_or_else(|| AuthUser {
            email: Some(email.to_string()),
            role: Some(role),
            ..AuthUser::default()
        });

        info!(role = %role, "Logged in");
        self.settle(Some(user.clone()));
        Ok(user)
    }

    /// Stop the refresher, clear the active role's session and navigate
    /// away.
    ///
    /// The destination follows the configured
    /// [`LogoutRedirect`](crate::config::LogoutRedirect).
    pub fn logout(&self) {
        self.stop_refresher();

        let store = self.session.token_store();
        let role = store.get_active_role();

        store.clear_pair(role);
        store.clear_active_role();
        self.settle(None);

        let path = self.session.config().logout_path(role);
        info!(role = %role, path = %path, "Logged out");
        self.session.navigator().navigate(path);
    }
}

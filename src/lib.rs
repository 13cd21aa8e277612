//! Realty Auth Client
//!
//! Session core for the realty transaction platform's agent dashboard and
//! client portal: role-scoped token storage, an HTTP client that refreshes
//! expired tokens once per request, a background session refresher, and an
//! observable authentication context.

/// Return `ClientError::Api` from the enclosing function if the response is
/// not a success
macro_rules! check_response {
    ($response:expr) => {
        if !$response.status().is_success() {
            return Err($crate::error::api_error($response).await);
        }
    };
}

pub mod account;
pub mod auth_context;
pub mod config;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod navigator;
pub mod refresher;
pub mod resources;
pub mod session;
pub mod token_store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use account::{AccountClient, RegisterRequest};
pub use auth_context::{AuthContext, AuthState};
pub use config::{ClientConfig, LogoutRedirect};
pub use error::{ClientError, Result};
pub use http_client::{ApiClient, ApiRequest};
pub use navigator::{Navigator, RecordingNavigator, TracingNavigator};
pub use refresher::{RefresherHandle, SessionRefresher};
pub use resources::ResourceClient;
pub use session::SessionManager;
pub use token_store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use types::{AuthUser, FlowToken, Role, TokenKind, TokenPair};

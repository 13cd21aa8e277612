//! Error types for the realty auth client

use crate::types::Role;
use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A 401 that could not be recovered by refreshing the role's session.
    #[error("Unauthorized as {role}: {detail}")]
    Unauthorized { role: Role, detail: String },

    #[error("No refresh token stored for {0}")]
    MissingRefreshToken(Role),

    /// Non-success response; `detail` comes from the server's `{detail}` body when present.
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Turn a non-success response into [`ClientError::Api`], preferring the
/// server's `{detail}` message over the raw body.
pub(crate) async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    ClientError::Api {
        status,
        detail: extract_detail(&text),
    }
}

pub(crate) fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<crate::types::ErrorDetail>(body) {
        Ok(crate::types::ErrorDetail {
            detail: serde_json::Value::String(message),
        }) => message,
        Ok(crate::types::ErrorDetail { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    }
}

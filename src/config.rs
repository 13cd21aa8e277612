//! Client configuration

use crate::error::{ClientError, Result};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Access tokens live about an hour; refresh a little before that.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 55 * 60;

pub const DEFAULT_AGENT_LOGIN_PATH: &str = "/agent-login";
pub const DEFAULT_CLIENT_LOGIN_PATH: &str = "/client-login";

/// Where `logout()` sends the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogoutRedirect {
    /// The login page of the role being logged out
    #[default]
    RoleLogin,
    /// Always the same path, whatever the role
    Fixed(String),
}

impl LogoutRedirect {
    /// Parse `role_login` or `fixed:<path>`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "role_login" => Some(Self::RoleLogin),
            other => other
                .strip_prefix("fixed:")
                .filter(|path| path.starts_with('/'))
                .map(|path| Self::Fixed(path.to_string())),
        }
    }
}

/// Configuration for the session client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub api_base_url: String,

    /// Proactive refresh interval in seconds
    /// Default: 3300 (55 minutes)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_agent_login_path")]
    pub agent_login_path: String,

    #[serde(default = "default_client_login_path")]
    pub client_login_path: String,

    #[serde(default)]
    pub logout_redirect: LogoutRedirect,

    /// Per-request timeout. `None` leaves it to the transport.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_agent_login_path() -> String {
    DEFAULT_AGENT_LOGIN_PATH.to_string()
}

fn default_client_login_path() -> String {
    DEFAULT_CLIENT_LOGIN_PATH.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            agent_login_path: default_agent_login_path(),
            client_login_path: default_client_login_path(),
            logout_redirect: LogoutRedirect::default(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `REALTY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file, then apply environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = serde_json::from_str(&content)?;
        config.load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("REALTY_API_URL") {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("REALTY_REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = secs.parse().map_err(|_| {
                ClientError::Configuration(format!("Invalid REALTY_REFRESH_INTERVAL_SECS: {secs}"))
            })?;
        }
        if let Ok(secs) = std::env::var("REALTY_REQUEST_TIMEOUT_SECS") {
            let secs = secs.parse().map_err(|_| {
                ClientError::Configuration(format!("Invalid REALTY_REQUEST_TIMEOUT_SECS: {secs}"))
            })?;
            self.request_timeout_secs = Some(secs);
        }
        if let Ok(value) = std::env::var("REALTY_LOGOUT_REDIRECT") {
            self.logout_redirect = LogoutRedirect::parse(&value).ok_or_else(|| {
                ClientError::Configuration(format!("Invalid REALTY_LOGOUT_REDIRECT: {value}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            ClientError::Configuration(format!("Invalid api_base_url {}: {e}", self.api_base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "api_base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ClientError::Configuration(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `/auth/refresh`
    pub fn url(&self, path: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn login_path(&self, role: Role) -> &str {
        match role {
            Role::Agent => &self.agent_login_path,
            Role::Client => &self.client_login_path,
        }
    }

    pub fn logout_path(&self, role: Role) -> &str {
        match &self.logout_redirect {
            LogoutRedirect::RoleLogin => self.login_path(role),
            LogoutRedirect::Fixed(path) => path,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(3300));
        assert_eq!(config.login_path(Role::Agent), "/agent-login");
        assert_eq!(config.login_path(Role::Client), "/client-login");
        assert!(config.request_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::new("https://api.example.com/");
        assert_eq!(config.url("/auth/refresh"), "https://api.example.com/auth/refresh");
        assert_eq!(config.url("deals"), "https://api.example.com/deals");
    }

    #[test]
    fn test_logout_redirect() {
        let mut config = ClientConfig::default();
        assert_eq!(config.logout_path(Role::Client), "/client-login");

        config.logout_redirect = LogoutRedirect::parse("fixed:/agent-login").unwrap();
        assert_eq!(config.logout_path(Role::Client), "/agent-login");

        assert_eq!(LogoutRedirect::parse("role_login"), Some(LogoutRedirect::RoleLogin));
        assert!(LogoutRedirect::parse("fixed:agent-login").is_none());
        assert!(LogoutRedirect::parse("somewhere").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ftp://files.example.com").validate().is_err());

        let mut config = ClientConfig::default();
        config.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"api_base_url": "https://api.example.com", "logout_redirect": {"fixed": "/agent-login"}}"#,
        )
        .unwrap();

        let config = ClientConfig::load_from_file(&path).unwrap();
        assert_eq!(config.refresh_interval_secs, DEFAULT_REFRESH_INTERVAL_SECS);
        assert_eq!(config.logout_redirect, LogoutRedirect::Fixed("/agent-login".to_string()));
    }
}

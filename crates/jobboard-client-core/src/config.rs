use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 250;

pub const ENV_API_BASE_URL: &str = "JOBBOARD_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "JOBBOARD_REQUEST_TIMEOUT_MS";
pub const ENV_TOKEN_STORE_PATH: &str = "JOBBOARD_TOKEN_STORE_PATH";

pub const SOURCE_DEFAULT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,
    #[error("base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
}

/// Backend routes consumed by the client. Paths are relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub current_user: String,
    pub conversations: String,
    pub send_message: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login/".to_string(),
            refresh: "/api/auth/token/refresh/".to_string(),
            logout: "/api/auth/logout/".to_string(),
            current_user: "/api/auth/user/".to_string(),
            conversations: "/api/messages/conversations/".to_string(),
            send_message: "/api/messages/send/".to_string(),
        }
    }
}

impl ApiEndpoints {
    #[must_use]
    pub fn conversation_messages(&self, conversation_id: &str) -> String {
        format!("{}{conversation_id}/messages/", self.conversations)
    }

    #[must_use]
    pub fn conversation_mark_read(&self, conversation_id: &str) -> String {
        format!("{}{conversation_id}/mark-read/", self.conversations)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub base_url_source: String,
    pub request_timeout: Duration,
    pub token_store_path: Option<PathBuf>,
    pub endpoints: ApiEndpoints,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_url_source: SOURCE_DEFAULT.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            token_store_path: None,
            endpoints: ApiEndpoints::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let (base_url, base_url_source) = resolve_api_base_url()?;
        let request_timeout = Duration::from_millis(resolve_request_timeout_ms());
        let token_store_path = env_non_empty(ENV_TOKEN_STORE_PATH).map(PathBuf::from);

        tracing::debug!(
            target: "jobboard.config",
            base_url = %base_url,
            source = %base_url_source,
            timeout_ms = request_timeout.as_millis() as u64,
            "resolved client configuration",
        );

        Ok(Self {
            base_url,
            base_url_source: base_url_source.to_string(),
            request_timeout,
            token_store_path,
            endpoints: ApiEndpoints::default(),
        })
    }
}

pub fn resolve_api_base_url() -> Result<(String, &'static str), ConfigError> {
    if let Some(base_url) = env_non_empty(ENV_API_BASE_URL) {
        return normalize_base_url(&base_url).map(|normalized| (normalized, ENV_API_BASE_URL));
    }
    normalize_base_url(DEFAULT_API_BASE_URL).map(|normalized| (normalized, SOURCE_DEFAULT))
}

#[must_use]
pub fn resolve_request_timeout_ms() -> u64 {
    env_non_empty(ENV_REQUEST_TIMEOUT_MS)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map_or(DEFAULT_REQUEST_TIMEOUT_MS, |value| {
            value.max(MIN_REQUEST_TIMEOUT_MS)
        })
}

pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(ConfigError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(ConfigError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

/// Reads an environment variable, treating blank values as unset.
#[must_use]
pub fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

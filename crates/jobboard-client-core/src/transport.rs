use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::{ClientConfig, ConfigError, MIN_REQUEST_TIMEOUT_MS, normalize_base_url};

pub const UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// An outbound call, described independently of the HTTP client that sends it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces any existing `Authorization` header with a bearer credential.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {token}")));
        self
    }

    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == UNAUTHORIZED
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport_invalid_path:{path}")]
    InvalidPath { path: String },
    #[error("transport_timeout:{message}")]
    Timeout { message: String },
    #[error("transport_request_failed:{message}")]
    Request { message: String },
    #[error("transport_read_failed:{message}")]
    Read { message: String },
}

/// Sends [`ApiRequest`]s. Implementations must not interpret status codes.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(&config.base_url)?;
        // Cookie store keeps session cookies flowing across calls.
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(
                    target: "jobboard.gateway",
                    error = %error,
                    "falling back to default http client without cookie store",
                );
                reqwest::Client::new()
            });
        Ok(Self {
            base_url,
            timeout: config
                .request_timeout
                .max(Duration::from_millis(MIN_REQUEST_TIMEOUT_MS)),
            http,
        })
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Some(trimmed.to_string());
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .endpoint(&request.path)
            .ok_or_else(|| TransportError::InvalidPath {
                path: request.path.clone(),
            })?;

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method, url.as_str())
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|error| TransportError::Read {
                message: error.to_string(),
            })?;

        tracing::trace!(
            target: "jobboard.gateway",
            method = request.method.as_str(),
            path = %request.path,
            status,
            "transport round trip",
        );

        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            message: error.to_string(),
        }
    } else {
        TransportError::Request {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base_url: &str) -> ReqwestTransport {
        ReqwestTransport::new(&ClientConfig::new(base_url)).expect("transport")
    }

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let transport = transport("https://jobs.example.com/");
        assert_eq!(
            transport.endpoint("/api/auth/user/"),
            Some("https://jobs.example.com/api/auth/user/".to_string())
        );
        assert_eq!(
            transport.endpoint("api/auth/user/"),
            Some("https://jobs.example.com/api/auth/user/".to_string())
        );
        assert_eq!(
            transport.endpoint("https://cdn.example.com/x"),
            Some("https://cdn.example.com/x".to_string())
        );
        assert_eq!(transport.endpoint("  "), None);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ReqwestTransport::new(&ClientConfig::new("   "));
        assert!(matches!(result, Err(ConfigError::EmptyBaseUrl)));
    }

    #[test]
    fn bearer_header_replaces_existing_authorization() {
        let request = ApiRequest::get("/api/auth/user/")
            .header("authorization", "Bearer stale")
            .with_bearer("fresh");
        assert_eq!(request.header_value("Authorization"), Some("Bearer fresh"));
        assert_eq!(
            request
                .headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                .count(),
            1
        );
    }

    #[test]
    fn response_helpers_classify_status() {
        assert!(ApiResponse::new(204, Vec::new()).is_success());
        assert!(!ApiResponse::new(302, Vec::new()).is_success());
        assert!(ApiResponse::new(401, Vec::new()).is_unauthorized());
        assert_eq!(ApiResponse::new(500, " boom ").text(), "boom");
    }
}

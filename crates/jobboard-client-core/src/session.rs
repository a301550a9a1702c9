use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ApiEndpoints;
use crate::gateway::{Gateway, GatewayError};
use crate::ids::deserialize_id;
use crate::redirect::ReturnTo;
use crate::store::StoreError;
use crate::token::{CredentialPair, Identity, TokenManager};
use crate::transport::{ApiRequest, HttpTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthInputError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email must contain '@'")]
    InvalidEmail,
    #[error("password must not be empty")]
    EmptyPassword,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] AuthInputError),
    #[error("login rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("login response undecodable: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: &str, password: &str) -> Result<Self, AuthInputError> {
        Ok(Self {
            email: normalize_email(email)?,
            password: normalize_password(password)?,
        })
    }
}

pub fn normalize_email(raw: &str) -> Result<String, AuthInputError> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(AuthInputError::EmptyEmail);
    }
    if !normalized.contains('@') {
        return Err(AuthInputError::InvalidEmail);
    }
    Ok(normalized)
}

fn normalize_password(raw: &str) -> Result<String, AuthInputError> {
    if raw.trim().is_empty() {
        return Err(AuthInputError::EmptyPassword);
    }
    Ok(raw.to_string())
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    access: String,
    #[serde(alias = "refreshToken", alias = "refresh_token")]
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub identity: Option<Identity>,
    /// Destination stashed by the last re-authentication, consumed here.
    pub resume_to: Option<String>,
}

pub struct SessionService {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
    gateway: Arc<Gateway>,
    return_to: ReturnTo,
    endpoints: ApiEndpoints,
}

impl SessionService {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        gateway: Arc<Gateway>,
        return_to: ReturnTo,
        endpoints: ApiEndpoints,
    ) -> Self {
        Self {
            transport,
            tokens: Arc::clone(gateway.tokens()),
            gateway,
            return_to,
            endpoints,
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome, SessionError> {
        let body = serde_json::to_value(credentials)
            .map_err(|error| SessionError::Decode(error.to_string()))?;
        let response = self
            .transport
            .execute(ApiRequest::post(self.endpoints.login.as_str()).json(body))
            .await?;

        if !response.is_success() {
            let message = response
                .json::<ErrorBody>()
                .ok()
                .and_then(|body| body.detail.or(body.message))
                .unwrap_or_else(|| format!("request failed with status {}", response.status));
            tracing::info!(target: "jobboard.auth", status = response.status, "login rejected");
            return Err(SessionError::Rejected {
                status: response.status,
                message,
            });
        }

        let tokens: LoginResponse = response
            .json()
            .map_err(|error| SessionError::Decode(error.to_string()))?;
        self.tokens
            .store(&CredentialPair::new(tokens.access, tokens.refresh))?;

        let identity = self.tokens.current_identity();
        let resume_to = self.return_to.take()?;
        tracing::info!(
            target: "jobboard.auth",
            user_id = identity.as_ref().map_or("<undecodable>", |identity| identity.user_id.as_str()),
            resume = resume_to.is_some(),
            "login succeeded",
        );
        Ok(LoginOutcome {
            identity,
            resume_to,
        })
    }

    /// Best-effort server-side revocation; local credentials are always cleared.
    pub async fn logout(&self) -> Result<(), SessionError> {
        match self.tokens.read() {
            Ok(Some(pair)) => {
                let request = ApiRequest::post(self.endpoints.logout.as_str())
                    .json(serde_json::json!({ "refresh": pair.refresh_token }))
                    .with_bearer(&pair.access_token);
                match self.transport.execute(request).await {
                    Ok(response) if response.is_success() => {}
                    Ok(response) => {
                        tracing::info!(target: "jobboard.auth", status = response.status, "logout not acknowledged by backend");
                    }
                    Err(error) => {
                        tracing::info!(target: "jobboard.auth", error = %error, "logout request failed");
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "credential store read failed during logout");
            }
        }
        self.tokens.clear()?;
        Ok(())
    }

    pub async fn current_user(&self) -> Result<UserProfile, GatewayError> {
        self.gateway.get_json(&self.endpoints.current_user).await
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.tokens.current_identity()
    }
}

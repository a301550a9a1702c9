//! Authenticated request gateway.
//!
//! Every call runs the same sequence: read the access token (refreshing once
//! if it is missing), send with a bearer header, and on a 401 refresh once and
//! re-send once. When no credential can be recovered the caller receives
//! [`GatewayError::ReauthRequired`] and the current location is stashed so the
//! login flow can return to it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::redirect::{DEFAULT_LOCATION, ReturnTo, login_redirect_url};
use crate::store::StoreError;
use crate::token::TokenManager;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReauthReason {
    /// No access token and no way to obtain one.
    AuthenticationRequired,
    /// The backend rejected the token and the refresh exchange failed.
    SessionExpired,
}

impl ReauthReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::SessionExpired => "session_expired",
        }
    }
}

impl fmt::Display for ReauthReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{reason}: sign in again to continue at {return_to}")]
    ReauthRequired {
        reason: ReauthReason,
        return_to: String,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("http_{status}:{body}")]
    Http { status: u16, body: String },
    #[error("decode_failed:{message}")]
    Decode { message: String },
}

impl GatewayError {
    #[must_use]
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, Self::ReauthRequired { .. })
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Where a UI should navigate for a re-authentication result.
    #[must_use]
    pub fn login_redirect_url(&self) -> Option<String> {
        match self {
            Self::ReauthRequired { return_to, .. } => Some(login_redirect_url(Some(return_to))),
            _ => None,
        }
    }
}

pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
    return_to: ReturnTo,
    location: RwLock<String>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<TokenManager>,
        return_to: ReturnTo,
    ) -> Self {
        Self {
            transport,
            tokens,
            return_to,
            location: RwLock::new(DEFAULT_LOCATION.to_string()),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Records the path + query the user is on; stashed if re-auth is needed.
    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = location.into();
    }

    #[must_use]
    pub fn location(&self) -> String {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let mut token = self.tokens.access_token()?;
        if token.is_none() {
            tracing::debug!(target: "jobboard.gateway", path = %request.path, "no access token; attempting refresh");
            token = self.tokens.refresh_after(None).await;
        }
        let Some(token) = token else {
            return Err(self.reauth(ReauthReason::AuthenticationRequired));
        };

        let response = self
            .transport
            .execute(request.clone().with_bearer(&token))
            .await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::info!(
            target: "jobboard.gateway",
            path = %request.path,
            "access token rejected; refreshing once",
        );
        let Some(fresh) = self.tokens.refresh_after(Some(&token)).await else {
            if let Err(error) = self.tokens.clear() {
                tracing::warn!(target: "jobboard.gateway", error = %error, "failed to clear credentials");
            }
            return Err(self.reauth(ReauthReason::SessionExpired));
        };

        // Whatever the retry returns goes back to the caller, 401 included.
        Ok(self.transport.execute(request.with_bearer(&fresh)).await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.request(ApiRequest::get(path)).await?;
        decode_json_response(response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        decode_json_response(response)
    }

    /// POSTs `body` and requires a 2xx status; the body is returned undecoded.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<ApiResponse, GatewayError>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(body).map_err(|error| GatewayError::Decode {
            message: format!("request body: {error}"),
        })?;
        let response = self.request(ApiRequest::post(path).json(payload)).await?;
        ensure_success(response)
    }

    fn reauth(&self, reason: ReauthReason) -> GatewayError {
        let location = self.location();
        let return_to = match self.return_to.stash(&location) {
            Ok(Some(stashed)) => stashed,
            Ok(None) => DEFAULT_LOCATION.to_string(),
            Err(error) => {
                tracing::warn!(target: "jobboard.gateway", error = %error, "failed to stash return-to location");
                location
            }
        };
        tracing::info!(
            target: "jobboard.gateway",
            reason = %reason,
            return_to = %return_to,
            "re-authentication required",
        );
        GatewayError::ReauthRequired { reason, return_to }
    }
}

pub fn ensure_success(response: ApiResponse) -> Result<ApiResponse, GatewayError> {
    if response.is_success() {
        return Ok(response);
    }
    let body = response.text();
    Err(GatewayError::Http {
        status: response.status,
        body: if body.is_empty() { "<empty>".to_string() } else { body },
    })
}

pub fn decode_json_response<T: DeserializeOwned>(response: ApiResponse) -> Result<T, GatewayError> {
    let response = ensure_success(response)?;
    response.json().map_err(|error| GatewayError::Decode {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_mapping_preserves_shape() {
        let error = ensure_success(ApiResponse::new(502, " gateway failed ")).expect_err("502");
        assert_eq!(error.to_string(), "http_502:gateway failed");

        let empty = ensure_success(ApiResponse::new(503, " ")).expect_err("503");
        assert_eq!(empty.to_string(), "http_503:<empty>");
    }

    #[test]
    fn decode_reports_bad_json() {
        let error = decode_json_response::<serde_json::Value>(ApiResponse::new(200, "{oops"))
            .expect_err("bad json");
        assert!(matches!(error, GatewayError::Decode { .. }));
    }

    #[test]
    fn reauth_error_exposes_login_url() {
        let error = GatewayError::ReauthRequired {
            reason: ReauthReason::SessionExpired,
            return_to: "/messages?c=4".to_string(),
        };
        assert!(error.is_reauth_required());
        assert_eq!(
            error.login_redirect_url().as_deref(),
            Some("/login?next=%2Fmessages%3Fc%3D4")
        );
        assert_eq!(
            error.to_string(),
            "session_expired: sign in again to continue at /messages?c=4"
        );
    }
}

//! Credential ownership: persistence, claim decoding, and refresh exchanges.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::IdValue;
use crate::store::{KeyValueStore, StoreError};
use crate::transport::{ApiRequest, HttpTransport};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Who the access token says the user is. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.email.clone().unwrap_or_else(|| self.user_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("token is not a three-part jwt")]
    Malformed,
    #[error("token payload is not base64url: {0}")]
    Base64(String),
    #[error("token payload is not json claims: {0}")]
    Claims(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AccessClaims {
    #[serde(default)]
    user_id: Option<IdValue>,
    #[serde(default)]
    sub: Option<IdValue>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    is_superuser: bool,
    #[serde(default)]
    exp: Option<f64>,
}

fn decode_claims(token: &str) -> Result<AccessClaims, TokenDecodeError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenDecodeError::Malformed);
    };
    if payload.is_empty() {
        return Err(TokenDecodeError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|error| TokenDecodeError::Base64(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| TokenDecodeError::Claims(error.to_string()))
}

/// Decodes the identity claims of an access token without verifying its signature.
pub fn decode_identity(token: &str) -> Result<Identity, TokenDecodeError> {
    let claims = decode_claims(token)?;
    let user_id = claims
        .user_id
        .or(claims.sub)
        .map(IdValue::into_string)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| TokenDecodeError::Claims("missing user_id/sub claim".to_string()))?;
    Ok(Identity {
        user_id,
        email: claims.email,
        first_name: claims.first_name,
        last_name: claims.last_name,
        is_staff: claims.is_staff,
        is_superuser: claims.is_superuser,
        expires_at: claims
            .exp
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp as i64, 0)),
    })
}

/// True unless the token carries an `exp` claim strictly in the future.
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

#[must_use]
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Ok(AccessClaims { exp: Some(exp), .. }) if exp.is_finite() => {
            (exp as i64) <= now.timestamp()
        }
        Ok(_) => true,
        Err(error) => {
            log_decode_failure(&error);
            true
        }
    }
}

fn log_decode_failure(error: &TokenDecodeError) {
    if cfg!(debug_assertions) {
        tracing::debug!(target: "jobboard.auth", error = %error, "token decode failed");
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    access: String,
    #[serde(default, alias = "refreshToken", alias = "refresh_token")]
    refresh: Option<String>,
}

/// Owns the persisted credential pair and performs refresh exchanges.
pub struct TokenManager {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn HttpTransport>,
    refresh_path: String,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            refresh_path: refresh_path.into(),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token)
    }

    /// Both tokens, or `None` when either one is missing.
    pub fn read(&self) -> Result<Option<CredentialPair>, StoreError> {
        let access = self.store.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.store.get(REFRESH_TOKEN_KEY)?;
        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        let token = match self.access_token() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "credential store read failed");
                return None;
            }
        };
        match decode_identity(&token) {
            Ok(identity) => Some(identity),
            Err(error) => {
                log_decode_failure(&error);
                None
            }
        }
    }

    #[must_use]
    pub fn is_expired(&self, token: &str) -> bool {
        is_expired(token)
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// A single failed exchange ends the session: credentials are cleared and
    /// `None` is returned. There is no retry.
    pub async fn refresh(&self) -> Option<String> {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(target: "jobboard.auth", "no refresh token stored");
                self.clear_after_failed_refresh();
                return None;
            }
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "refresh token read failed");
                self.clear_after_failed_refresh();
                return None;
            }
        };

        let request = ApiRequest::post(self.refresh_path.as_str())
            .json(serde_json::json!({ "refresh": refresh_token }));
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "token refresh transport failed");
                self.clear_after_failed_refresh();
                return None;
            }
        };

        if !response.is_success() {
            tracing::warn!(
                target: "jobboard.auth",
                status = response.status,
                "token refresh rejected; session ended",
            );
            self.clear_after_failed_refresh();
            return None;
        }

        let refreshed: RefreshResponse = match response.json() {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "token refresh body undecodable");
                self.clear_after_failed_refresh();
                return None;
            }
        };

        // An access token that was not persisted counts as a failed refresh.
        if let Err(error) = self.store.set(ACCESS_TOKEN_KEY, &refreshed.access) {
            tracing::warn!(target: "jobboard.auth", error = %error, "failed to persist refreshed access token; session ended");
            self.clear_after_failed_refresh();
            return None;
        }
        if let Some(rotated) = refreshed.refresh.as_deref() {
            if let Err(error) = self.store.set(REFRESH_TOKEN_KEY, rotated) {
                tracing::warn!(target: "jobboard.auth", error = %error, "failed to persist rotated refresh token");
            }
        }
        tracing::debug!(target: "jobboard.auth", rotated = refreshed.refresh.is_some(), "access token refreshed");
        Some(refreshed.access)
    }

    /// Single-flight refresh for callers that saw `stale` as the access token.
    ///
    /// Callers queue on one async lock. Once inside, a caller whose stale token
    /// has already been replaced takes the stored token instead of refreshing.
    pub async fn refresh_after(&self, stale: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;
        match self.access_token() {
            Ok(Some(current)) if Some(current.as_str()) != stale => return Some(current),
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(target: "jobboard.auth", error = %error, "credential store read failed");
            }
        }
        self.refresh().await
    }

    fn clear_after_failed_refresh(&self) {
        if let Err(error) = self.clear() {
            tracing::warn!(target: "jobboard.auth", error = %error, "failed to clear credentials");
        }
    }
}

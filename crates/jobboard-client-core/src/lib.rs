//! Client core for the job-board API: credential storage, token refresh,
//! and the authenticated request gateway the data layers build on.

pub mod config;
pub mod gateway;
pub mod ids;
pub mod redirect;
pub mod session;
pub mod store;
pub mod token;
pub mod transport;

use std::sync::Arc;

pub use config::{ApiEndpoints, ClientConfig, ConfigError};
pub use gateway::{Gateway, GatewayError, ReauthReason};
pub use redirect::{ReturnTo, login_redirect_url};
pub use session::{LoginCredentials, LoginOutcome, SessionError, SessionService, UserProfile};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use token::{CredentialPair, Identity, TokenManager, decode_identity, is_expired};
pub use transport::{
    ApiRequest, ApiResponse, HttpMethod, HttpTransport, ReqwestTransport, TransportError,
};

/// The wired-up client: one transport, one token manager, one gateway.
pub struct ClientCore {
    pub config: ClientConfig,
    pub tokens: Arc<TokenManager>,
    pub gateway: Arc<Gateway>,
    pub session: SessionService,
    pub return_to: ReturnTo,
}

impl ClientCore {
    /// `credentials` persists the token pair; `session_store` holds
    /// navigation state that only lives as long as the session.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn KeyValueStore>,
        session_store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ConfigError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(
            config,
            transport,
            credentials,
            session_store,
        ))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn KeyValueStore>,
        session_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let tokens = Arc::new(TokenManager::new(
            credentials,
            Arc::clone(&transport),
            config.endpoints.refresh.clone(),
        ));
        let return_to = ReturnTo::new(session_store);
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&transport),
            Arc::clone(&tokens),
            return_to.clone(),
        ));
        let session = SessionService::new(
            transport,
            Arc::clone(&gateway),
            return_to.clone(),
            config.endpoints.clone(),
        );
        Self {
            config,
            tokens,
            gateway,
            session,
            return_to,
        }
    }
}

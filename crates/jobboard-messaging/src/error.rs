use jobboard_client_core::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The user has to sign in again; never replaced by fixture data.
    #[error(transparent)]
    Reauth(GatewayError),
    #[error("messaging backend unavailable")]
    Unavailable(#[source] GatewayError),
    #[error("recipient id must not be empty")]
    EmptyRecipient,
    #[error("message content must not be empty")]
    EmptyContent,
}

impl MessagingError {
    #[must_use]
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, Self::Reauth(_))
    }

    #[must_use]
    pub fn login_redirect_url(&self) -> Option<String> {
        match self {
            Self::Reauth(error) => error.login_redirect_url(),
            _ => None,
        }
    }
}

impl From<GatewayError> for MessagingError {
    fn from(error: GatewayError) -> Self {
        if error.is_reauth_required() {
            Self::Reauth(error)
        } else {
            Self::Unavailable(error)
        }
    }
}

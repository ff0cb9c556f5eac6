use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No client id configured")]
    NotConfigured,

    #[error("Authorization callback carried no state, or no sign-in is pending")]
    MissingState,

    #[error("Authorization state mismatch; the callback does not belong to this sign-in")]
    StateMismatch,

    #[error("Authorization callback carried no code")]
    MissingCode,

    #[error("Authorization denied: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Identity lookup failed: {0}")]
    IdentityUnavailable(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Whether starting the sign-in again can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuthError::NotConfigured | AuthError::InvalidUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Not authenticated with the list provider")]
    NotAuthenticated,

    #[error("Authentication expired; sign in again")]
    AuthenticationExpired,

    #[error("Rate limited by the list provider (retry after {retry_after_seconds:?}s)")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl LibraryError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures that only a fresh sign-in can resolve.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::AuthenticationExpired)
    }

    /// True when the same request may succeed later without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Bridge(_))
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

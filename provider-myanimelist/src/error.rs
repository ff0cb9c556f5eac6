//! Error types for the MyAnimeList provider

use core_library::LibraryError;
use thiserror::Error;

/// MyAnimeList provider errors
#[derive(Error, Debug)]
pub enum MyAnimeListError {
    /// No access token, and refreshing did not produce one
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The service rejected the token again after re-authorization
    #[error("Authentication expired")]
    AuthenticationExpired,

    /// Rate limit still in effect after backoff
    #[error("Rate limit exceeded (retry after {retry_after_seconds:?} seconds)")]
    RateLimited { retry_after_seconds: Option<u64> },

    /// API request returned an error
    #[error("MyAnimeList API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Pagination cursor outside the configured API
    #[error("Invalid page cursor: {0}")]
    InvalidCursor(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for MyAnimeList operations
pub type Result<T> = std::result::Result<T, MyAnimeListError>;

impl From<MyAnimeListError> for LibraryError {
    fn from(error: MyAnimeListError) -> Self {
        match error {
            MyAnimeListError::NotAuthenticated => LibraryError::NotAuthenticated,
            MyAnimeListError::AuthenticationExpired => LibraryError::AuthenticationExpired,
            MyAnimeListError::RateLimited {
                retry_after_seconds,
            } => LibraryError::RateLimited {
                retry_after_seconds,
            },
            MyAnimeListError::InvalidCursor(cursor) => {
                LibraryError::invalid_input("cursor", cursor)
            }
            MyAnimeListError::BridgeError(e) => LibraryError::Bridge(e),
            other => LibraryError::Provider(other.to_string()),
        }
    }
}

use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not authenticated; sign in before syncing")]
    NotAuthenticated,

    #[error("Authentication expired; sign in again")]
    AuthenticationExpired,

    #[error("Rate limited by the list provider (retry after {retry_after_seconds:?}s)")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync job {job_id} not found")]
    JobNotFound { job_id: String },

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl SyncError {
    /// Whether running the same sync again can succeed without user action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Provider(_) | Self::Network(_) | Self::Timeout(_)
        )
    }
}

impl From<LibraryError> for SyncError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::NotAuthenticated => Self::NotAuthenticated,
            LibraryError::AuthenticationExpired => Self::AuthenticationExpired,
            LibraryError::RateLimited {
                retry_after_seconds,
            } => Self::RateLimited {
                retry_after_seconds,
            },
            LibraryError::Provider(message) => Self::Provider(message),
            LibraryError::Bridge(e) => Self::Network(e.to_string()),
            LibraryError::InvalidInput { field, message } => Self::InvalidInput { field, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] core_analytics::AnalyticsError),
}

impl CoreError {
    /// Whether the user has to sign in again before retrying.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            CoreError::Sync(
                core_sync::SyncError::NotAuthenticated | core_sync::SyncError::AuthenticationExpired
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Single-flight token refresh.
//!
//! Concurrent callers share one network exchange: the first caller installs
//! a shared future, later callers await the same future and see its result.

use crate::credentials::CredentialStore;
use crate::oauth::OAuthFlowManager;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Upper bound for one refresh, retries included.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

type InFlight = Shared<BoxFuture<'static, bool>>;

#[derive(Clone)]
pub struct RefreshCoordinator {
    credentials: Arc<CredentialStore>,
    oauth: Arc<OAuthFlowManager>,
    event_bus: EventBus,
    timeout: Duration,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl RefreshCoordinator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        oauth: Arc<OAuthFlowManager>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            credentials,
            oauth,
            event_bus,
            timeout: DEFAULT_REFRESH_TIMEOUT,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Refresh the access token, joining a refresh already in progress.
    ///
    /// Returns `true` when a new token was stored. A rejected refresh signs
    /// the user out; a missing client id or refresh token does not.
    pub async fn refresh(&self) -> bool {
        let shared = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let this = self.clone();
                    let future = async move {
                        let refreshed = this.perform().await;
                        this.in_flight.lock().await.take();
                        refreshed
                    }
                    .boxed()
                    .shared();
                    *slot = Some(future.clone());
                    future
                }
            }
        };

        shared.await
    }

    #[instrument(skip(self))]
    async fn perform(&self) -> bool {
        self.credentials.load().await;

        let (Some(client_id), Some(refresh_token)) = (
            self.credentials.client_id(),
            self.credentials.refresh_token(),
        ) else {
            debug!("No refresh token available");
            return false;
        };

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let outcome = timeout(
            self.timeout,
            self.oauth.refresh_access_token(&client_id, &refresh_token),
        )
        .await;

        let message = match outcome {
            Ok(Ok(tokens)) => {
                let expiry = self.credentials.save_tokens(&tokens).await;
                info!(expires_at = %expiry, "Access token refreshed");
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                        expires_at: expiry.timestamp(),
                    }));
                return true;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("Token refresh timed out after {:?}", self.timeout),
        };

        warn!(error = %message, "Token refresh failed, signing out");
        self.credentials.logout().await;

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message,
            recoverable: false,
        }));
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedOut { forced: true }));

        false
    }
}

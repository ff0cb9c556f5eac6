//! # Authentication Manager
//!
//! Orchestrates the PKCE sign-in flow on top of the [`CredentialStore`],
//! the [`OAuthFlowManager`] and the [`RefreshCoordinator`], and publishes
//! auth events on the application's event bus.
//!
//! ## Flow
//!
//! ```text
//! Idle ──begin_sign_in──> AwaitingExternalAuth ──handle_callback──> Exchanging
//!   ^                                                                 │
//!   └──────────────────── failure ──────────────── success ──> Authenticated
//! ```
//!
//! Starting a new sign-in while one is pending replaces the pending request.
//! A failed callback discards the pending request and returns the flow to
//! `Idle`.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::AuthManager;
//! use core_runtime::config::CoreConfig;
//! use core_runtime::events::EventBus;
//!
//! # async fn run(config: CoreConfig) -> core_auth::Result<()> {
//! let event_bus = EventBus::new(config.event_buffer_size);
//! let manager = AuthManager::from_config(&config, event_bus);
//! manager.initialize().await;
//!
//! let url = manager.begin_sign_in().await?;
//! println!("Open {url}");
//!
//! // After the browser redirects to the loopback listener:
//! manager
//!     .handle_callback_url("http://localhost:8080/callback?code=abc&state=xyz")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::credentials::CredentialStore;
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthFlowManager, PkceVerifier};
use crate::refresh::RefreshCoordinator;
use crate::types::{AuthFlowState, UserIdentity};
use async_trait::async_trait;
use bridge_traits::storage::SecureStore;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Secure store key holding the `state` of the pending authorization.
pub const OAUTH_STATE_KEY: &str = "oauth_state";

/// Default timeout for a single network step of the flow.
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Source of bearer tokens for authenticated requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A currently valid access token, if any.
    async fn access_token(&self) -> Option<String>;

    /// Attempt to obtain a new access token. Returns `true` on success.
    async fn refresh(&self) -> bool;
}

pub struct AuthManager {
    credentials: Arc<CredentialStore>,
    oauth: Arc<OAuthFlowManager>,
    refresher: RefreshCoordinator,
    secure_store: Arc<dyn SecureStore>,
    event_bus: EventBus,
    configured_client_id: Option<String>,
    flow: RwLock<AuthFlowState>,
    pending: Mutex<Option<PkceVerifier>>,
    identity: RwLock<Option<UserIdentity>>,
    auth_timeout: Duration,
}

impl AuthManager {
    pub fn new(
        credentials: Arc<CredentialStore>,
        oauth: Arc<OAuthFlowManager>,
        secure_store: Arc<dyn SecureStore>,
        event_bus: EventBus,
    ) -> Self {
        let refresher =
            RefreshCoordinator::new(credentials.clone(), oauth.clone(), event_bus.clone());

        Self {
            credentials,
            oauth,
            refresher,
            secure_store,
            event_bus,
            configured_client_id: None,
            flow: RwLock::new(AuthFlowState::Idle),
            pending: Mutex::new(None),
            identity: RwLock::new(None),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Build the manager and its collaborators from a validated config.
    pub fn from_config(config: &CoreConfig, event_bus: EventBus) -> Self {
        let credentials = Arc::new(CredentialStore::new(
            config.secure_store.clone(),
            config.legacy_store.clone(),
            config.clock.clone(),
        ));
        let oauth = Arc::new(OAuthFlowManager::new(
            config.endpoints.clone(),
            config.http_client.clone(),
        ));

        let mut manager = Self::new(credentials, oauth, config.secure_store.clone(), event_bus);
        manager.configured_client_id = config.client_id.clone();
        manager
    }

    pub fn with_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self.refresher = self.refresher.with_timeout(auth_timeout);
        self
    }

    /// Load stored credentials and seed the configured client id when none
    /// is stored yet.
    pub async fn initialize(&self) {
        self.credentials.load().await;

        if self.credentials.client_id().is_none() {
            if let Some(client_id) = &self.configured_client_id {
                self.credentials.set_client_id(client_id).await;
            }
        }

        info!(
            authenticated = self.credentials.is_authenticated(),
            "Authentication manager initialized"
        );
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub async fn set_client_id(&self, client_id: &str) {
        self.credentials.load().await;
        self.credentials.set_client_id(client_id).await;
    }

    /// Start a sign-in and return the authorization URL to open.
    #[instrument(skip(self))]
    pub async fn begin_sign_in(&self) -> Result<String> {
        self.credentials.load().await;
        let client_id = self.credentials.client_id().ok_or(AuthError::NotConfigured)?;

        let verifier = PkceVerifier::new();
        let url = self.oauth.build_auth_url(&client_id, &verifier)?;

        if let Err(e) = self
            .secure_store
            .set_secret(OAUTH_STATE_KEY, verifier.state().as_bytes())
            .await
        {
            warn!(error = %e, "Failed to persist authorization state");
        }

        if self.pending.lock().await.replace(verifier).is_some() {
            debug!("Replacing pending authorization request");
        }
        *self.flow.write().await = AuthFlowState::AwaitingExternalAuth;

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn));
        info!("Authorization URL issued");
        Ok(url)
    }

    /// Complete a sign-in from the loopback redirect URL.
    pub async fn handle_callback_url(&self, callback_url: &str) -> Result<()> {
        let url = Url::parse(callback_url)
            .map_err(|e| AuthError::InvalidUrl(format!("callback URL: {}", e)))?;

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            self.discard_pending().await;
            return Err(self
                .fail(AuthError::AuthorizationDenied { error, description })
                .await);
        }

        self.handle_callback(code.as_deref(), state.as_deref()).await
    }

    /// Complete a sign-in with the `code` and `state` from the redirect.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, code: Option<&str>, state: Option<&str>) -> Result<()> {
        match self.complete_sign_in(code, state).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn complete_sign_in(&self, code: Option<&str>, state: Option<&str>) -> Result<()> {
        // The pending request is single use whatever the outcome.
        let pending = self.pending.lock().await.take();
        let persisted = self.take_persisted_state().await;

        let provided = state
            .filter(|state| !state.is_empty())
            .ok_or(AuthError::MissingState)?;
        let expected = persisted
            .or_else(|| pending.as_ref().map(|p| p.state().to_string()))
            .ok_or(AuthError::MissingState)?;

        if provided != expected {
            warn!("Authorization callback state does not match the pending request");
            return Err(AuthError::StateMismatch);
        }

        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingCode)?;
        let verifier = pending
            .filter(|p| p.state() == expected)
            .ok_or_else(|| {
                AuthError::TokenExchangeFailed("No code verifier for this request".to_string())
            })?;
        let client_id = self.credentials.client_id().ok_or(AuthError::NotConfigured)?;

        *self.flow.write().await = AuthFlowState::Exchanging;

        let tokens = timeout(
            self.auth_timeout,
            self.oauth.exchange_code(&client_id, code, &verifier),
        )
        .await
        .map_err(|_| AuthError::OperationTimeout {
            operation: "token exchange".to_string(),
        })??;

        self.credentials.save_tokens(&tokens).await;

        match timeout(
            self.auth_timeout,
            self.oauth.fetch_identity(&tokens.access_token),
        )
        .await
        {
            Ok(Ok(identity)) => {
                self.credentials
                    .save_identity(&identity.name, identity.id)
                    .await;
                *self.identity.write().await = Some(identity);
            }
            Ok(Err(e)) => warn!(error = %e, "Signed in without account identity"),
            Err(_) => warn!("Identity lookup timed out; signed in without account identity"),
        }

        *self.flow.write().await = AuthFlowState::Authenticated;

        let username = self.credentials.username();
        info!(username = ?username, "Sign-in completed");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            username,
            user_id: self.credentials.user_id(),
        }));

        Ok(())
    }

    /// Abandon a pending sign-in. Returns `false` when none was pending.
    pub async fn cancel_sign_in(&self) -> bool {
        let had_pending = self.discard_pending().await;
        let mut flow = self.flow.write().await;
        if *flow == AuthFlowState::AwaitingExternalAuth {
            *flow = AuthFlowState::Idle;
        }
        if had_pending {
            info!("Sign-in cancelled");
        }
        had_pending
    }

    /// Sign out. The client id is kept.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.credentials.load().await;
        self.discard_pending().await;
        self.credentials.logout().await;
        *self.identity.write().await = None;
        *self.flow.write().await = AuthFlowState::Idle;

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedOut { forced: false }));
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.load().await;
        self.credentials.is_authenticated()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.credentials.load().await;
        self.credentials.access_token()
    }

    pub async fn refresh(&self) -> bool {
        self.refresher.refresh().await
    }

    pub async fn state(&self) -> AuthFlowState {
        match *self.flow.read().await {
            AuthFlowState::AwaitingExternalAuth => AuthFlowState::AwaitingExternalAuth,
            AuthFlowState::Exchanging => AuthFlowState::Exchanging,
            _ if self.credentials.is_authenticated() => AuthFlowState::Authenticated,
            _ => AuthFlowState::Idle,
        }
    }

    /// Identity fetched during this session's sign-in, while the account
    /// is still signed in.
    pub async fn identity(&self) -> Option<UserIdentity> {
        self.credentials.username()?;
        self.identity.read().await.clone()
    }

    async fn fail(&self, error: AuthError) -> AuthError {
        warn!(error = %error, "Sign-in failed");
        *self.flow.write().await = AuthFlowState::Idle;
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        }));
        error
    }

    async fn discard_pending(&self) -> bool {
        let had_pending = self.pending.lock().await.take().is_some();
        let had_persisted = self.take_persisted_state().await.is_some();
        had_pending || had_persisted
    }

    async fn take_persisted_state(&self) -> Option<String> {
        let state = match self.secure_store.get_secret(OAUTH_STATE_KEY).await {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read authorization state");
                None
            }
        };

        if state.is_some() {
            if let Err(e) = self.secure_store.delete_secret(OAUTH_STATE_KEY).await {
                warn!(error = %e, "Failed to delete authorization state");
            }
        }

        state.filter(|state| !state.is_empty())
    }
}

#[async_trait]
impl AccessTokenSource for AuthManager {
    async fn access_token(&self) -> Option<String> {
        AuthManager::access_token(self).await
    }

    async fn refresh(&self) -> bool {
        AuthManager::refresh(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::time::ManualClock;
    use chrono::TimeZone;
    use core_runtime::config::ApiEndpoints;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait::async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";

    struct Harness {
        manager: AuthManager,
        store: Arc<MemorySecureStore>,
        bus: EventBus,
        clock: Arc<ManualClock>,
    }

    fn harness(http: MockHttpClient) -> Harness {
        let store = Arc::new(MemorySecureStore::new());
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
        ));
        let credentials = Arc::new(CredentialStore::new(store.clone(), None, clock.clone()));
        let oauth = Arc::new(OAuthFlowManager::new(
            ApiEndpoints::default(),
            Arc::new(http),
        ));
        let bus = EventBus::new(32);
        let manager = AuthManager::new(credentials, oauth, store.clone(), bus.clone());

        Harness {
            manager,
            store,
            bus,
            clock,
        }
    }

    fn state_of(url: &str) -> String {
        let pairs: HashMap<_, _> = Url::parse(url).unwrap().query_pairs().into_owned().collect();
        pairs["state"].clone()
    }

    fn token_response() -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(
            200,
            r#"{"token_type":"Bearer","access_token":"access","refresh_token":"refresh","expires_in":2678400}"#,
        ))
    }

    fn identity_response() -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(200, r#"{"id":42,"name":"kaori"}"#))
    }

    #[tokio::test]
    async fn test_begin_sign_in_requires_client_id() {
        let h = harness(MockHttpClient::new());

        let result = h.manager.begin_sign_in().await;

        assert_eq!(result, Err(AuthError::NotConfigured));
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);
    }

    #[tokio::test]
    async fn test_begin_sign_in_persists_state() {
        let h = harness(MockHttpClient::new());
        let mut events = h.bus.subscribe();
        h.manager.set_client_id("client").await;

        let url = h.manager.begin_sign_in().await.unwrap();

        assert!(url.starts_with("https://myanimelist.net/v1/oauth2/authorize?"));
        let state = state_of(&url);
        assert_eq!(h.store.raw(OAUTH_STATE_KEY), Some(state.into_bytes()));
        assert_eq!(
            h.manager.state().await,
            AuthFlowState::AwaitingExternalAuth
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn)
        );
    }

    #[tokio::test]
    async fn test_callback_signs_in() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == TOKEN_URL)
            .times(1)
            .returning(|_| token_response());
        http.expect_execute()
            .withf(|request| request.url.contains("/users/@me?"))
            .times(1)
            .returning(|_| identity_response());

        let h = harness(http);
        let mut events = h.bus.subscribe();
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());

        h.manager
            .handle_callback(Some("auth-code"), Some(&state))
            .await
            .unwrap();

        assert_eq!(h.manager.access_token().await.as_deref(), Some("access"));
        assert!(h.manager.is_authenticated().await);
        assert_eq!(h.manager.state().await, AuthFlowState::Authenticated);
        assert_eq!(h.manager.identity().await.unwrap().id, 42);
        assert_eq!(h.store.raw(OAUTH_STATE_KEY), None);

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SignedIn {
                username: Some("kaori".to_string()),
                user_id: Some(42),
            })
        );
    }

    #[tokio::test]
    async fn test_token_expires_with_clock() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == TOKEN_URL)
            .returning(|_| token_response());
        http.expect_execute()
            .withf(|request| request.url.contains("/users/@me?"))
            .returning(|_| identity_response());

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());
        h.manager
            .handle_callback(Some("auth-code"), Some(&state))
            .await
            .unwrap();

        h.clock.advance(chrono::Duration::days(32));

        assert_eq!(h.manager.access_token().await, None);
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);
    }

    #[tokio::test]
    async fn test_state_mismatch_never_calls_token_endpoint() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let h = harness(http);
        h.manager.set_client_id("client").await;
        h.manager.begin_sign_in().await.unwrap();

        let result = h
            .manager
            .handle_callback(Some("auth-code"), Some("forged-state"))
            .await;

        assert_eq!(result, Err(AuthError::StateMismatch));
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);
        assert_eq!(h.store.raw(OAUTH_STATE_KEY), None);
        assert!(!h.manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_missing_state() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let h = harness(http);
        h.manager.set_client_id("client").await;
        h.manager.begin_sign_in().await.unwrap();

        let result = h.manager.handle_callback(Some("auth-code"), None).await;
        assert_eq!(result, Err(AuthError::MissingState));

        // Nothing is pending after a callback without sign-in.
        let result = h
            .manager
            .handle_callback(Some("auth-code"), Some("any"))
            .await;
        assert_eq!(result, Err(AuthError::MissingState));
    }

    #[tokio::test]
    async fn test_exchange_failure_discards_verifier() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(400, r#"{"error":"invalid_grant"}"#)));

        let h = harness(http);
        let mut events = h.bus.subscribe();
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());

        let result = h.manager.handle_callback(Some("code"), Some(&state)).await;
        assert!(matches!(result, Err(AuthError::TokenExchangeFailed(_))));
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);

        let retry = h.manager.handle_callback(Some("code"), Some(&state)).await;
        assert_eq!(retry, Err(AuthError::MissingState));

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SigningIn)
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::AuthError {
                recoverable: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_identity_failure_is_not_fatal() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == TOKEN_URL)
            .times(1)
            .returning(|_| token_response());
        http.expect_execute()
            .withf(|request| request.url.contains("/users/@me?"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(503, "unavailable")));

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());

        h.manager
            .handle_callback(Some("code"), Some(&state))
            .await
            .unwrap();

        assert!(h.manager.is_authenticated().await);
        assert_eq!(h.manager.identity().await, None);
    }

    #[tokio::test]
    async fn test_callback_url_parsing() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == TOKEN_URL)
            .returning(|_| token_response());
        http.expect_execute()
            .withf(|request| request.url.contains("/users/@me?"))
            .returning(|_| identity_response());

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());

        h.manager
            .handle_callback_url(&format!(
                "http://localhost:8080/callback?code=auth-code&state={}",
                state
            ))
            .await
            .unwrap();

        assert!(h.manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_callback_url_with_error() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());

        let result = h
            .manager
            .handle_callback_url(&format!(
                "http://localhost:8080/callback?error=access_denied&error_description=User+declined&state={}",
                state
            ))
            .await;

        assert_eq!(
            result,
            Err(AuthError::AuthorizationDenied {
                error: "access_denied".to_string(),
                description: Some("User declined".to_string()),
            })
        );
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);
        assert_eq!(h.store.raw(OAUTH_STATE_KEY), None);
    }

    #[tokio::test]
    async fn test_restart_replaces_pending_request() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(0);

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let first = state_of(&h.manager.begin_sign_in().await.unwrap());
        let second = state_of(&h.manager.begin_sign_in().await.unwrap());
        assert_ne!(first, second);

        let result = h.manager.handle_callback(Some("code"), Some(&first)).await;
        assert_eq!(result, Err(AuthError::StateMismatch));
    }

    #[tokio::test]
    async fn test_cancel_sign_in() {
        let h = harness(MockHttpClient::new());
        h.manager.set_client_id("client").await;

        assert!(!h.manager.cancel_sign_in().await);

        h.manager.begin_sign_in().await.unwrap();
        assert!(h.manager.cancel_sign_in().await);
        assert_eq!(h.manager.state().await, AuthFlowState::Idle);
        assert_eq!(h.store.raw(OAUTH_STATE_KEY), None);
    }

    #[tokio::test]
    async fn test_logout_keeps_client_id() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == TOKEN_URL)
            .returning(|_| token_response());
        http.expect_execute()
            .withf(|request| request.url.contains("/users/@me?"))
            .returning(|_| identity_response());

        let h = harness(http);
        h.manager.set_client_id("client").await;
        let state = state_of(&h.manager.begin_sign_in().await.unwrap());
        h.manager
            .handle_callback(Some("code"), Some(&state))
            .await
            .unwrap();

        let mut events = h.bus.subscribe();
        h.manager.logout().await;

        assert!(!h.manager.is_authenticated().await);
        assert_eq!(h.manager.identity().await, None);
        assert_eq!(
            h.manager.credentials().client_id().as_deref(),
            Some("client")
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SignedOut { forced: false })
        );
    }
}

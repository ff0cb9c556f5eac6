//! # Core Configuration Module
//!
//! `CoreConfig` carries the host bridges and the tunables of the tracker core.
//! It is built through [`CoreConfigBuilder`], which validates everything up
//! front and reports missing capabilities with actionable messages.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - all traffic to the tracking service (desktop default: reqwest)
//! - `SecureStore` - durable credential persistence (desktop default: OS keyring)
//!
//! ## Optional Dependencies
//!
//! - `LegacyStore` - preference file written by older releases (desktop default: JSON file)
//! - `Clock` - time source for token expiry (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .client_id("my-client-id")
//!     .sync_settings(SyncSettings {
//!         page_delay: Duration::from_millis(300),
//!         ..SyncSettings::default()
//!     })
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, LegacyStore, RetryPolicy, SecureStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_AUTH_URL: &str = "https://myanimelist.net/v1/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.myanimelist.net/v2";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// The list endpoint refuses larger pages.
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(350);
/// Smallest pause between list pages the service tolerates.
pub const MIN_PAGE_DELAY: Duration = Duration::from_millis(300);
const MAX_PAGE_DELAY: Duration = Duration::from_secs(60);

/// How token requests are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenRequestFormat {
    /// Standard OAuth form body (`grant_type`, `code`, `code_verifier`, ...).
    #[default]
    Form,
    /// camelCase JSON body accepted by a token relay that holds the client secret.
    Json,
}

/// Endpoints of the tracking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    /// Loopback address the host listens on for the authorization callback.
    pub redirect_uri: String,
    pub token_format: TokenRequestFormat,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            token_format: TokenRequestFormat::Form,
        }
    }
}

impl ApiEndpoints {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("api_base_url", &self.api_base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} must use http or https, got '{}'",
                    name,
                    url.scheme()
                )));
            }
        }

        let redirect = Url::parse(&self.redirect_uri).map_err(|e| {
            Error::Config(format!(
                "Invalid redirect_uri '{}': {}",
                self.redirect_uri, e
            ))
        })?;
        let loopback = matches!(
            redirect.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        );
        if redirect.scheme() != "http" || !loopback {
            return Err(Error::Config(format!(
                "redirect_uri must be an http loopback address, got '{}'",
                self.redirect_uri
            )));
        }

        Ok(())
    }
}

/// Pagination behaviour of the list synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Entries requested per page, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
    /// Upper bound for a whole synchronization.
    pub sync_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            sync_timeout: Duration::from_secs(300),
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.page_delay < MIN_PAGE_DELAY {
            return Err(Error::Config(format!(
                "Page delay must be at least {}ms, got {}ms",
                MIN_PAGE_DELAY.as_millis(),
                self.page_delay.as_millis()
            )));
        }

        if self.page_delay > MAX_PAGE_DELAY {
            return Err(Error::Config(
                "Page delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.sync_timeout < self.page_delay {
            return Err(Error::Config(
                "Sync timeout must be longer than the page delay".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default backoff for HTTP 429 responses.
pub fn default_rate_limit_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        use_exponential_backoff: true,
    }
}

fn validate_rate_limit_policy(policy: &RetryPolicy) -> Result<()> {
    if policy.max_attempts > 10 {
        return Err(Error::Config(
            "Rate limit retries exceed maximum of 10".to_string(),
        ));
    }
    if policy.base_delay.is_zero() {
        return Err(Error::Config(
            "Rate limit base delay must be greater than 0ms".to_string(),
        ));
    }
    if policy.max_delay < policy.base_delay {
        return Err(Error::Config(
            "Rate limit max delay must not be shorter than the base delay".to_string(),
        ));
    }
    Ok(())
}

/// Core configuration for the tracker core.
#[derive(Clone)]
pub struct CoreConfig {
    pub endpoints: ApiEndpoints,
    pub sync: SyncSettings,
    /// Backoff applied when the service answers 429.
    pub rate_limit: RetryPolicy,
    /// Client id to seed the credential store with when none is stored yet.
    pub client_id: Option<String>,
    /// Capacity of the event bus channel.
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub legacy_store: Option<Arc<dyn LegacyStore>>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("endpoints", &self.endpoints)
            .field("sync", &self.sync)
            .field("rate_limit", &self.rate_limit)
            .field("client_id", &self.client_id.as_ref().map(|_| "<set>"))
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "legacy_store",
                &self.legacy_store.as_ref().map(|_| "LegacyStore { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks endpoint URLs, sync pacing, rate-limit policy and the client id.
    pub fn validate(&self) -> Result<()> {
        self.endpoints.validate()?;
        self.sync.validate()?;
        validate_rate_limit_policy(&self.rate_limit)?;

        if let Some(client_id) = &self.client_id {
            if client_id.trim().is_empty() {
                return Err(Error::Config("Client id cannot be blank".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::capability_missing(
        "HttpClient",
        "HttpClient implementation is required to reach the tracking service. \
         Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
         Mobile: inject the platform-native HTTP stack.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::capability_missing(
        "SecureStore",
        "SecureStore implementation is required for credential persistence. \
         Desktop: enable the 'desktop-shims' feature to use KeyringSecureStore. \
         Mobile: inject platform-native secure storage (Keychain/Keystore).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_legacy_store() -> Option<Arc<dyn LegacyStore>> {
    Some(Arc::new(bridge_desktop::JsonFileLegacyStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_legacy_store() -> Option<Arc<dyn LegacyStore>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    endpoints: Option<ApiEndpoints>,
    sync: Option<SyncSettings>,
    rate_limit: Option<RetryPolicy>,
    client_id: Option<String>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    legacy_store: Option<Arc<dyn LegacyStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    pub fn endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn rate_limit_policy(mut self, policy: RetryPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn legacy_store(mut self, store: Arc<dyn LegacyStore>) -> Self {
        self.legacy_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default is compiled in
    /// - [`Error::Config`] when a value fails validation
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let legacy_store = self.legacy_store.or_else(provide_default_legacy_store);

        let config = CoreConfig {
            endpoints: self.endpoints.unwrap_or_default(),
            sync: self.sync.unwrap_or_default(),
            rate_limit: self.rate_limit.unwrap_or_else(default_rate_limit_policy),
            client_id: self.client_id,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            secure_store,
            legacy_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

//! Credential Store
//!
//! Two storage tiers back the in-memory cache:
//!
//! - the durable tier, a [`SecureStore`] holding one JSON blob under
//!   [`CREDENTIALS_KEY`], which is the only write target;
//! - the legacy tier, a [`LegacyStore`] of plain string keys left by older
//!   releases, which is read as a fallback and emptied as fields migrate.
//!
//! Mutations update the cache before any await, so readers observe them
//! immediately. Durable writes are serialized and always persist the latest
//! cache snapshot. A failed durable write is logged and the cache is kept.

use crate::types::{Credentials, OAuthTokens};
use bridge_traits::storage::{LegacyStore, SecureStore};
use bridge_traits::time::Clock;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Secure store key of the credential blob.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Keys written by older releases.
pub mod legacy_keys {
    pub const CLIENT_ID: &str = "mal_client_id";
    pub const ACCESS_TOKEN: &str = "mal_access_token";
    pub const REFRESH_TOKEN: &str = "mal_refresh_token";
    /// Epoch milliseconds; `0` means no expiry.
    pub const TOKEN_EXPIRY: &str = "mal_token_expiry";
    pub const USERNAME: &str = "mal_username";
    pub const USER_ID: &str = "mal_user_id";

    /// Keys cleared on logout.
    pub const SESSION: [&str; 5] = [ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRY, USERNAME, USER_ID];
}

pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    legacy_store: Option<Arc<dyn LegacyStore>>,
    clock: Arc<dyn Clock>,
    cache: RwLock<Credentials>,
    loaded: OnceCell<()>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(
        secure_store: Arc<dyn SecureStore>,
        legacy_store: Option<Arc<dyn LegacyStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            secure_store,
            legacy_store,
            clock,
            cache: RwLock::new(Credentials::default()),
            loaded: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Populate the cache from durable storage and migrate legacy fields.
    ///
    /// Runs once per store; later calls return immediately.
    pub async fn load(&self) {
        self.loaded.get_or_init(|| self.load_once()).await;
    }

    async fn load_once(&self) {
        let durable = match self.secure_store.get_secret(CREDENTIALS_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Credentials>(&bytes) {
                Ok(credentials) => credentials,
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable credential blob");
                    Credentials::default()
                }
            },
            Ok(None) => Credentials::default(),
            Err(e) => {
                warn!(error = %e, "Durable credential store unavailable");
                Credentials::default()
            }
        };

        let migrated = {
            let mut cache = self.write_cache();

            // Fields written before load completed are newer than the blob.
            fill(&mut cache.client_id, durable.client_id);
            fill(&mut cache.access_token, durable.access_token);
            fill(&mut cache.refresh_token, durable.refresh_token);
            fill(&mut cache.token_expiry, durable.token_expiry);
            fill(&mut cache.username, durable.username);
            fill(&mut cache.user_id, durable.user_id);

            let legacy = self.read_legacy();
            let before = cache.clone();
            fill(&mut cache.client_id, legacy.client_id);
            fill(&mut cache.access_token, legacy.access_token);
            fill(&mut cache.refresh_token, legacy.refresh_token);
            fill(&mut cache.token_expiry, legacy.token_expiry);
            fill(&mut cache.username, legacy.username);
            fill(&mut cache.user_id, legacy.user_id);
            *cache != before
        };

        if migrated {
            info!("Migrating legacy credentials into durable storage");
            self.persist().await;
        }

        debug!(
            authenticated = self.is_authenticated(),
            "Credential store loaded"
        );
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn client_id(&self) -> Option<String> {
        self.read_cache()
            .client_id
            .clone()
            .or_else(|| self.legacy_string(legacy_keys::CLIENT_ID))
            .filter(|value| !value.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_cache()
            .refresh_token
            .clone()
            .or_else(|| self.legacy_string(legacy_keys::REFRESH_TOKEN))
            .filter(|value| !value.is_empty())
    }

    pub fn username(&self) -> Option<String> {
        self.read_cache()
            .username
            .clone()
            .or_else(|| self.legacy_string(legacy_keys::USERNAME))
    }

    pub fn user_id(&self) -> Option<i64> {
        self.read_cache().user_id.or_else(|| {
            self.legacy_string(legacy_keys::USER_ID)
                .and_then(|value| value.parse().ok())
        })
    }

    /// The most recent expiry known to either tier.
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        let cached = self.read_cache().token_expiry;
        let legacy = self
            .legacy_string(legacy_keys::TOKEN_EXPIRY)
            .and_then(|value| parse_expiry(&value));
        cached.max(legacy)
    }

    /// The access token, only while it is non-empty and unexpired.
    pub fn access_token(&self) -> Option<String> {
        let token = self
            .read_cache()
            .access_token
            .clone()
            .or_else(|| self.legacy_string(legacy_keys::ACCESS_TOKEN))
            .filter(|value| !value.is_empty())?;

        let expiry = self.token_expiry()?;
        if self.clock.now() < expiry {
            Some(token)
        } else {
            None
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Copy of the cached credentials without legacy fallback.
    pub fn snapshot(&self) -> Credentials {
        self.read_cache().clone()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub async fn set_client_id(&self, client_id: &str) {
        self.write_cache().client_id = Some(client_id.to_string());
        self.persist().await;
    }

    /// Store freshly issued tokens and return their absolute expiry.
    ///
    /// A response without a refresh token keeps the current one.
    pub async fn save_tokens(&self, tokens: &OAuthTokens) -> DateTime<Utc> {
        let expiry = tokens.expires_at(self.clock.now());
        {
            let mut cache = self.write_cache();
            cache.access_token = Some(tokens.access_token.clone());
            if let Some(refresh_token) = &tokens.refresh_token {
                cache.refresh_token = Some(refresh_token.clone());
            }
            cache.token_expiry = Some(expiry);
        }
        self.persist().await;
        expiry
    }

    pub async fn save_identity(&self, username: &str, user_id: i64) {
        {
            let mut cache = self.write_cache();
            cache.username = Some(username.to_string());
            cache.user_id = Some(user_id);
        }
        self.persist().await;
    }

    /// Clear everything except the client id.
    pub async fn logout(&self) {
        {
            let mut cache = self.write_cache();
            *cache = cache.signed_out();
        }

        // Getters fall back to legacy keys for empty fields, so those keys go
        // before the durable write can fail.
        if let Some(legacy) = &self.legacy_store {
            for key in legacy_keys::SESSION {
                if let Err(e) = legacy.remove(key) {
                    warn!(key = key, error = %e, "Failed to remove legacy credential");
                }
            }
        }

        self.persist().await;
        info!("Credentials cleared");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn persist(&self) {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot();

        let blob = match serde_json::to_vec(&snapshot) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to encode credentials");
                return;
            }
        };

        if let Err(e) = self.secure_store.set_secret(CREDENTIALS_KEY, &blob).await {
            warn!(error = %e, "Failed to persist credentials; keeping in-memory copy");
            return;
        }

        self.remove_migrated_legacy(&snapshot);
    }

    fn remove_migrated_legacy(&self, persisted: &Credentials) {
        let Some(legacy) = &self.legacy_store else {
            return;
        };

        let authoritative = [
            (legacy_keys::CLIENT_ID, persisted.client_id.is_some()),
            (legacy_keys::ACCESS_TOKEN, persisted.access_token.is_some()),
            (legacy_keys::REFRESH_TOKEN, persisted.refresh_token.is_some()),
            (legacy_keys::TOKEN_EXPIRY, persisted.token_expiry.is_some()),
            (legacy_keys::USERNAME, persisted.username.is_some()),
            (legacy_keys::USER_ID, persisted.user_id.is_some()),
        ];

        for (key, _) in authoritative.iter().filter(|(_, present)| *present) {
            if legacy.get(key).is_none() {
                continue;
            }
            match legacy.remove(key) {
                Ok(()) => debug!(key = key, "Removed migrated legacy credential"),
                Err(e) => warn!(key = key, error = %e, "Failed to remove legacy credential"),
            }
        }
    }

    fn read_legacy(&self) -> Credentials {
        Credentials {
            client_id: self.legacy_string(legacy_keys::CLIENT_ID),
            access_token: self.legacy_string(legacy_keys::ACCESS_TOKEN),
            refresh_token: self.legacy_string(legacy_keys::REFRESH_TOKEN),
            token_expiry: self
                .legacy_string(legacy_keys::TOKEN_EXPIRY)
                .and_then(|value| parse_expiry(&value)),
            username: self.legacy_string(legacy_keys::USERNAME),
            user_id: self
                .legacy_string(legacy_keys::USER_ID)
                .and_then(|value| value.parse().ok()),
        }
    }

    fn legacy_string(&self, key: &str) -> Option<String> {
        self.legacy_store
            .as_ref()
            .and_then(|legacy| legacy.get(key))
            .filter(|value| !value.is_empty())
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, Credentials> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = value.trim().parse().ok()?;
    if millis <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

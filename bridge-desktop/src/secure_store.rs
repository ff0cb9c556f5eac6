//! Secure Credential Storage using OS Keychain

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tracing::{debug, error};

pub const DEFAULT_SERVICE_NAME: &str = "anime-tracker-core";

/// Keyring-based secure storage implementation
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// Keyring calls block, so each one runs on tokio's blocking pool. Values are
/// base64 encoded because the keyring only stores strings.
#[derive(Debug, Clone)]
pub struct KeyringSecureStore {
    service_name: String,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::Storage(format!("Keyring error: {}", e))
    }

    /// Run a keyring operation for `key` off the async executor.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> std::result::Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service_name.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key)?;
            op(entry)
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Keyring task failed: {}", e)))?
        .map_err(Self::map_keyring_error)
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = STANDARD.encode(value);
        self.with_entry(key, move |entry| entry.set_password(&encoded))
            .await?;

        debug!(key = key, "Stored secret in keyring");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let encoded = self
            .with_entry(key, |entry| match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            })
            .await?;

        match encoded {
            Some(encoded) => {
                let decoded = STANDARD.decode(encoded).map_err(|e| {
                    error!(key = key, error = %e, "Failed to decode secret");
                    BridgeError::Storage(format!("Failed to decode secret: {}", e))
                })?;
                Ok(Some(decoded))
            }
            None => {
                debug!(key = key, "Secret not found in keyring");
                Ok(None)
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;

        debug!(key = key, "Deleted secret from keyring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_name() {
        let store = KeyringSecureStore::new();
        assert_eq!(store.service_name(), DEFAULT_SERVICE_NAME);
    }

    #[test]
    fn test_custom_service_name() {
        let store = KeyringSecureStore::with_service_name("test-service");
        assert_eq!(store.service_name(), "test-service");
    }

    #[tokio::test]
    async fn test_round_trip_when_keyring_available() {
        // Headless CI machines usually have no secret service; skip quietly there.
        let store = KeyringSecureStore::with_service_name("anime-tracker-core-test");
        let key = "round-trip-key";

        if let Err(e) = store.set_secret(key, b"secret-value").await {
            println!("Keyring not available ({}), skipping test", e);
            return;
        }

        if let Ok(Some(value)) = store.get_secret(key).await {
            assert_eq!(value, b"secret-value".to_vec());
        }

        store.delete_secret(key).await.unwrap();
        store.delete_secret(key).await.unwrap();
    }
}

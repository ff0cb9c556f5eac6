//! In-memory bridges shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::{LegacyStore, SecureStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    gets: AtomicUsize,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Storage("keychain locked".to_string()));
        }
        self.put(key, value);
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw(key))
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLegacyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl LegacyStore for MemoryLegacyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Token endpoint stub that answers every request with the same response
/// after `delay`, counting requests.
pub struct CountingTokenEndpoint {
    status: u16,
    body: String,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CountingTokenEndpoint {
    pub fn new(status: u16, body: impl Into<String>, delay: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            delay,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for CountingTokenEndpoint {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        tokio::time::sleep(self.delay).await;
        Ok(HttpResponse::new(self.status, self.body.clone()))
    }
}

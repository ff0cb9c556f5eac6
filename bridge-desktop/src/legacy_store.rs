//! Legacy preference file
//!
//! Older desktop releases kept credentials as plain string entries in a JSON
//! object on disk. This store reads that file and rewrites it when entries are
//! removed after migration.

use bridge_traits::{
    error::{BridgeError, Result},
    storage::LegacyStore,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const FILE_NAME: &str = "preferences.json";

pub struct JsonFileLegacyStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileLegacyStore {
    /// Open the store at the platform data directory.
    pub fn new() -> Self {
        Self::open(Self::default_path())
    }

    /// Open the store at `path`. A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring malformed legacy preferences");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Legacy preferences unreadable");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened legacy preferences");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join("anime-tracker-core")
            .join(FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::Storage(format!("Failed to encode preferences: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Default for JsonFileLegacyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyStore for JsonFileLegacyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&entries)
    }
}

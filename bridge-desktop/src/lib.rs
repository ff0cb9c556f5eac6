//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//! - `LegacyStore` reading the JSON preference file written by older releases
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{JsonFileLegacyStore, KeyringSecureStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .secure_store(Arc::new(KeyringSecureStore::new()))
//!     .legacy_store(Arc::new(JsonFileLegacyStore::new()))
//!     .build()?;
//! ```

mod http;
mod legacy_store;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use legacy_store::JsonFileLegacyStore;

#[cfg(feature = "secure-store")]
pub use secure_store::{KeyringSecureStore, DEFAULT_SERVICE_NAME};

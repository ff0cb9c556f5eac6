//! # Authentication Module
//!
//! Account sign-in and credential management for the list service.
//!
//! ## Overview
//!
//! - [`CredentialStore`]: cached credentials over a durable secure store,
//!   with one-way migration from the legacy key/value store.
//! - [`OAuthFlowManager`]: OAuth 2.0 authorization code flow with PKCE.
//! - [`RefreshCoordinator`]: single-flight access token refresh.
//! - [`AuthManager`]: sign-in state machine and auth event emission.
//!
//! Request layers depend on [`AccessTokenSource`] rather than on the
//! manager itself.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod refresh;
pub mod types;

#[cfg(test)]
mod test_support;

pub use credentials::CredentialStore;
pub use error::{AuthError, Result};
pub use manager::{AccessTokenSource, AuthManager, OAUTH_STATE_KEY};
pub use oauth::{OAuthFlowManager, PkceVerifier};
pub use refresh::RefreshCoordinator;
pub use types::{AnimeStatistics, AuthFlowState, Credentials, OAuthTokens, UserIdentity};

//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Stateless protocol pieces of the sign-in flow (RFC 6749, RFC 7636):
//! building the authorization URL, exchanging the code, refreshing the
//! access token and looking up the account identity. Sequencing and state
//! live in [`AuthManager`](crate::manager::AuthManager).
//!
//! # Security
//!
//! - The verifier never leaves the process; only its S256 challenge is sent
//!   with the authorization request.
//! - Tokens, codes and verifiers are never logged.

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, UserIdentity};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::{ApiEndpoints, TokenRequestFormat};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Length of the generated code verifier (RFC 7636 allows 43 to 128).
pub const VERIFIER_LENGTH: usize = 128;
/// Length of the generated `state` value.
pub const STATE_LENGTH: usize = 32;

/// Unreserved URL characters allowed in a code verifier.
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// PKCE code verifier plus the `state` of one authorization attempt.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let verifier = (0..VERIFIER_LENGTH)
            .map(|_| VERIFIER_CHARSET[rng.gen_range(0..VERIFIER_CHARSET.len())] as char)
            .collect();

        let state = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect();

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: `BASE64URL_NOPAD(SHA256(verifier))`.
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &"[REDACTED]")
            .finish()
    }
}

/// Token endpoint JSON body for a relay.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayCodeExchange<'a> {
    client_id: &'a str,
    code: &'a str,
    code_verifier: &'a str,
    redirect_uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRefresh<'a> {
    client_id: &'a str,
    refresh_token: &'a str,
}

/// Token endpoint response; relays answer in camelCase.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in", alias = "expiresIn")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    fn into_tokens(self) -> Option<OAuthTokens> {
        if self.access_token.is_empty() {
            return None;
        }
        Some(OAuthTokens::new(
            self.access_token,
            self.refresh_token.filter(|token| !token.is_empty()),
            self.expires_in,
        ))
    }
}

/// Protocol client for the authorization server and the identity endpoint.
pub struct OAuthFlowManager {
    endpoints: ApiEndpoints,
    scopes: Vec<String>,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(endpoints: ApiEndpoints, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            endpoints,
            scopes: Vec::new(),
            http_client,
        }
    }

    /// Request scopes with the authorization. The default service grants
    /// full access without any.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Authorization URL the user must visit for `verifier`'s attempt.
    pub fn build_auth_url(&self, client_id: &str, verifier: &PkceVerifier) -> Result<String> {
        let mut url = Url::parse(&self.endpoints.auth_url)
            .map_err(|e| AuthError::InvalidUrl(format!("auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", client_id);
            query.append_pair("code_challenge", &verifier.challenge());
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("redirect_uri", &self.endpoints.redirect_uri);
            query.append_pair("state", verifier.state());
            if !self.scopes.is_empty() {
                query.append_pair("scope", &self.scopes.join(" "));
            }
        }

        debug!("Built authorization URL");
        Ok(url.to_string())
    }

    fn code_exchange_request(
        &self,
        client_id: &str,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<HttpRequest> {
        let request = HttpRequest::post(self.endpoints.token_url.clone());
        let request = match self.endpoints.token_format {
            TokenRequestFormat::Form => request.form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", verifier.verifier()),
                ("client_id", client_id),
                ("redirect_uri", self.endpoints.redirect_uri.as_str()),
            ]),
            TokenRequestFormat::Json => request.json(&RelayCodeExchange {
                client_id,
                code,
                code_verifier: verifier.verifier(),
                redirect_uri: &self.endpoints.redirect_uri,
            }),
        };
        request.map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))
    }

    fn refresh_request(&self, client_id: &str, refresh_token: &str) -> Result<HttpRequest> {
        let request = HttpRequest::post(self.endpoints.token_url.clone());
        let request = match self.endpoints.token_format {
            TokenRequestFormat::Form => request.form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
            ]),
            TokenRequestFormat::Json => request.json(&RelayRefresh {
                client_id,
                refresh_token,
            }),
        };
        request.map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))
    }

    /// Exchange an authorization code for tokens.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        client_id: &str,
        code: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        let request = self.code_exchange_request(client_id, code, verifier)?;

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let body = error_body(&response);
            warn!(status = status, error = %body, "Token endpoint rejected authorization code");
            return Err(AuthError::TokenExchangeFailed(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let tokens = response
            .json::<TokenResponse>()
            .ok()
            .and_then(TokenResponse::into_tokens)
            .ok_or_else(|| {
                AuthError::TokenExchangeFailed("Token response carried no access token".to_string())
            })?;

        info!(expires_in = tokens.expires_in, "Exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Obtain a new access token. 4xx answers fail at once; other failures
    /// are retried with exponential backoff.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let request = self.refresh_request(client_id, refresh_token)?;

            let failure = match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    let tokens = response
                        .json::<TokenResponse>()
                        .ok()
                        .and_then(TokenResponse::into_tokens)
                        .ok_or_else(|| {
                            AuthError::TokenRefreshFailed(
                                "Token response carried no access token".to_string(),
                            )
                        })?;
                    info!(expires_in = tokens.expires_in, "Refreshed access token");
                    return Ok(tokens);
                }
                Ok(response) if response.is_client_error() => {
                    let body = error_body(&response);
                    warn!(status = response.status, error = %body, "Token refresh rejected");
                    return Err(AuthError::TokenRefreshFailed(format!(
                        "Token endpoint returned {}: {}",
                        response.status, body
                    )));
                }
                Ok(response) => format!("{} - {}", response.status, error_body(&response)),
                Err(e) => e.to_string(),
            };

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {}",
                    attempts, failure
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Token refresh failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Look up the signed-in account.
    #[instrument(skip_all)]
    pub async fn fetch_identity(&self, access_token: &str) -> Result<UserIdentity> {
        let url = format!(
            "{}/users/@me?fields=anime_statistics",
            self.endpoints.api_base_url.trim_end_matches('/')
        );
        let request = HttpRequest::get(url).bearer_token(access_token);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::IdentityUnavailable(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::IdentityUnavailable(format!(
                "Identity endpoint returned {}",
                response.status
            )));
        }

        response
            .json::<UserIdentity>()
            .map_err(|e| AuthError::IdentityUnavailable(e.to_string()))
    }
}

fn error_body(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

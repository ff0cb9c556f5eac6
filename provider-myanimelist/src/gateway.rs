//! Authenticated request gateway
//!
//! Every API call goes through [`RequestGateway::get`]:
//!
//! 1. read the current access token, refreshing once when there is none;
//! 2. issue the request with the bearer token;
//! 3. on 401, refresh once and retry once;
//! 4. on 429 or 5xx, back off per the [`RetryPolicy`] and retry, honouring
//!    `Retry-After` when the service sends one.

use crate::error::{MyAnimeListError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_auth::AccessTokenSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RequestGateway {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenSource>,
    rate_limit: RetryPolicy,
}

impl RequestGateway {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn AccessTokenSource>,
        rate_limit: RetryPolicy,
    ) -> Self {
        Self {
            http_client,
            tokens,
            rate_limit,
        }
    }

    pub fn rate_limit(&self) -> &RetryPolicy {
        &self.rate_limit
    }

    async fn current_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.access_token().await {
            return Ok(token);
        }

        debug!("No valid access token, refreshing before request");
        if !self.tokens.refresh().await {
            return Err(MyAnimeListError::NotAuthenticated);
        }
        self.tokens
            .access_token()
            .await
            .ok_or(MyAnimeListError::NotAuthenticated)
    }

    /// Authenticated GET returning the successful response.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut token = self.current_token().await?;
        let mut reauthorized = false;
        let mut attempt = 0;

        loop {
            let request = HttpRequest::get(url)
                .bearer_token(&token)
                .header("Accept", "application/json")
                .timeout(REQUEST_TIMEOUT);

            let response = self.http_client.execute(request).await?;
            let status = response.status;

            if response.is_success() {
                debug!(status = status, "API request succeeded");
                return Ok(response);
            }

            if status == 401 {
                if reauthorized {
                    warn!("Access token rejected after re-authorization");
                    return Err(MyAnimeListError::AuthenticationExpired);
                }
                reauthorized = true;

                debug!("Access token rejected, refreshing");
                if !self.tokens.refresh().await {
                    return Err(MyAnimeListError::AuthenticationExpired);
                }
                token = self
                    .tokens
                    .access_token()
                    .await
                    .ok_or(MyAnimeListError::AuthenticationExpired)?;
                continue;
            }

            let throttled = status == 429;
            if !throttled && !response.is_server_error() {
                warn!(status = status, "API request failed");
                return Err(MyAnimeListError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                });
            }

            let retry_after = response.retry_after_seconds();
            if attempt >= self.rate_limit.max_attempts {
                warn!(
                    status = status,
                    attempts = attempt + 1,
                    "API request failed after retries"
                );
                return Err(if throttled {
                    MyAnimeListError::RateLimited {
                        retry_after_seconds: retry_after,
                    }
                } else {
                    MyAnimeListError::ApiError {
                        status_code: status,
                        message: format!("Request failed after {} retries", attempt),
                    }
                });
            }

            let delay = match retry_after {
                Some(seconds) => Duration::from_secs(seconds).min(self.rate_limit.max_delay),
                None => self.rate_limit.delay_for_attempt(attempt),
            };
            warn!(
                status = status,
                attempt = attempt + 1,
                max_attempts = self.rate_limit.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "API request throttled, backing off"
            );

            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }
}

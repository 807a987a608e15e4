//! Single-slot cache for a machine-to-machine (M2M) access token.
//!
//! The report service calls the identity provider's Management API with a
//! token obtained through the OAuth 2.0 client credentials grant. Fetching a
//! new token for every request would be slow and rate limited, so the last
//! token is kept until it is within [`SAFETY_MARGIN`] of expiring.
//!
//! # Behavior
//!
//! - A cached token is reused while `now + SAFETY_MARGIN < expires_at`
//! - Otherwise one issuance call is made and its result replaces the slot
//! - Refreshes are single-flight: concurrent callers that find the slot stale
//!   queue on the write lock and reuse the token the first caller fetched
//! - No retry. A failed issuance is returned to the caller and the slot keeps
//!   whatever it held before
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::{ClientCredentialsConfig, ClientCredentialsIssuer, TokenCache};
//! use std::sync::Arc;
//!
//! let issuer = ClientCredentialsIssuer::new(ClientCredentialsConfig::new(
//!     "https://tenant.example.com/oauth/token".to_string(),
//!     "m2m-client".to_string(),
//!     SecretString::from("m2m-secret"),
//!     "https://tenant.example.com/api/v2/".to_string(),
//!     "read:clients read:actions".to_string(),
//! ))?;
//! let cache = TokenCache::new(Arc::new(issuer));
//!
//! let token = cache.get_token().await?;
//! let header = format!("Bearer {}", token.expose_secret());
//! ```
//!
//! # Security
//!
//! - Client secret and tokens are `SecretString` and never logged
//! - Error response bodies from the token endpoint are logged at trace only

use crate::clock::{Clock, SystemClock};
use crate::secret::{ExposeSecret, SecretString};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// A cached token is only handed out if it stays valid at least this long.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Default HTTP request timeout for the token endpoint.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for the token endpoint.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while obtaining an M2M token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// Transport failure, timeout, or 5xx from the token endpoint.
    #[error("HTTP client error: {0}")]
    HttpError(String),

    /// The token endpoint rejected our credentials (400, 401, 403).
    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The token endpoint answered 2xx with a body we can't use.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// The issuer could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Token Issuer
// =============================================================================

/// A freshly issued token and its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The access token value.
    pub access_token: SecretString,

    /// Lifetime in seconds, counted from issuance.
    pub expires_in: u64,
}

/// Source of new M2M tokens.
///
/// [`ClientCredentialsIssuer`] is the production implementation; tests
/// substitute counters and failures.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Obtain a new token.
    async fn issue(&self) -> Result<IssuedToken, TokenError>;
}

/// Settings for the client credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    /// Full URL of the token endpoint (e.g. `https://tenant/oauth/token`).
    pub token_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// API identifier the token is requested for.
    pub audience: String,

    /// Space-separated scopes to request.
    pub scope: String,

    /// HTTP request timeout.
    pub http_timeout: Duration,
}

impl ClientCredentialsConfig {
    /// Create a configuration with the default HTTP timeout.
    #[must_use]
    pub fn new(
        token_url: String,
        client_id: String,
        client_secret: SecretString,
        audience: String,
        scope: String,
    ) -> Self {
        Self {
            token_url,
            client_id,
            client_secret,
            audience,
            scope,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// JSON body for the client credentials grant.
#[derive(Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    scope: &'a str,
}

/// OAuth 2.0 token response.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Issues tokens by POSTing a client credentials grant to the token endpoint.
pub struct ClientCredentialsIssuer {
    config: ClientCredentialsConfig,
    http_client: reqwest::Client,
}

impl ClientCredentialsIssuer {
    /// Build the issuer and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: ClientCredentialsConfig) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl TokenIssuer for ClientCredentialsIssuer {
    #[instrument(skip_all, name = "common.token_cache.issue")]
    async fn issue(&self) -> Result<IssuedToken, TokenError> {
        let config = &self.config;

        debug!(
            target: "common.token_cache",
            client_id = %config.client_id,
            url = %config.token_url,
            "Requesting M2M token"
        );

        let body = ClientCredentialsRequest {
            grant_type: "client_credentials",
            client_id: &config.client_id,
            client_secret: config.client_secret.expose_secret(),
            audience: &config.audience,
            scope: &config.scope,
        };

        let response = self
            .http_client
            .post(&config.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_cache", error = %e, "Token request failed");
                TokenError::HttpError(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
                warn!(target: "common.token_cache", error = %e, "Failed to parse token response");
                TokenError::InvalidResponse(e.to_string())
            })?;

            if token_response.access_token.is_empty() {
                return Err(TokenError::InvalidResponse(
                    "access_token is empty".to_string(),
                ));
            }

            Ok(IssuedToken {
                access_token: SecretString::from(token_response.access_token),
                expires_in: token_response.expires_in,
            })
        } else if matches!(status.as_u16(), 400 | 401 | 403) {
            let body = response.text().await.unwrap_or_else(|e| {
                trace!(target: "common.token_cache", error = %e, "Failed to read error response body");
                "<failed to read body>".to_string()
            });
            warn!(
                target: "common.token_cache",
                status = %status,
                "Token endpoint rejected client credentials"
            );
            trace!(target: "common.token_cache", body = %body, "Rejection response body");
            Err(TokenError::AuthenticationRejected(format!("Status {status}")))
        } else if status.is_server_error() {
            warn!(target: "common.token_cache", status = %status, "Token endpoint returned server error");
            Err(TokenError::HttpError(format!("Token endpoint error: {status}")))
        } else {
            warn!(target: "common.token_cache", status = %status, "Unexpected response from token endpoint");
            Err(TokenError::HttpError(format!("Unexpected status: {status}")))
        }
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// The one cached credential.
struct CachedCredential {
    token: SecretString,
    /// Unix seconds.
    expires_at: i64,
}

impl CachedCredential {
    fn is_usable_at(&self, now: i64) -> bool {
        #[allow(clippy::cast_possible_wrap)]
        let margin = SAFETY_MARGIN.as_secs() as i64;
        now.saturating_add(margin) < self.expires_at
    }
}

/// Holds at most one M2M token and refreshes it on demand.
///
/// Owned by the service's shared state and passed around as `Arc<TokenCache>`.
pub struct TokenCache {
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<CachedCredential>>,
}

impl TokenCache {
    /// Create an empty cache that reads the system clock.
    #[must_use]
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            clock: Arc::new(SystemClock),
            slot: RwLock::new(None),
        }
    }

    /// Replace the clock (tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Return a token valid for at least [`SAFETY_MARGIN`], refreshing if needed.
    ///
    /// # Errors
    ///
    /// Returns the issuer's `TokenError` if a refresh was needed and failed.
    #[instrument(skip_all, name = "common.token_cache.get_token")]
    pub async fn get_token(&self) -> Result<SecretString, TokenError> {
        {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref() {
                if cached.is_usable_at(self.clock.now()) {
                    trace!(target: "common.token_cache", "M2M token cache hit");
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;

        // Another caller may have refreshed while we waited for the lock
        let now = self.clock.now();
        if let Some(cached) = slot.as_ref() {
            if cached.is_usable_at(now) {
                debug!(target: "common.token_cache", "M2M token refreshed by concurrent caller");
                return Ok(cached.token.clone());
            }
        }

        let start = Instant::now();
        let issued = match self.issuer.issue().await {
            Ok(issued) => issued,
            Err(e) => {
                record_token_refresh("error", start.elapsed());
                warn!(target: "common.token_cache", error = %e, "M2M token refresh failed");
                return Err(e);
            }
        };

        let lifetime = i64::try_from(issued.expires_in).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(lifetime);
        let token = issued.access_token.clone();

        *slot = Some(CachedCredential {
            token: issued.access_token,
            expires_at,
        });

        record_token_refresh("success", start.elapsed());
        info!(
            target: "common.token_cache",
            expires_in_secs = issued.expires_in,
            "M2M token refreshed"
        );

        Ok(token)
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Metric: `token_cache_refresh_total{status}`, `token_cache_refresh_duration_seconds`.
fn record_token_refresh(status: &'static str, duration: Duration) {
    histogram!("token_cache_refresh_duration_seconds").record(duration.as_secs_f64());
    counter!("token_cache_refresh_total", "status" => status).increment(1);
}

// =============================================================================
// Tests
// =============================================================================

//! JWKS client for the identity provider's signing keys.
//!
//! Fetches `{issuer}/.well-known/jwks.json` and caches the key set for a
//! configurable TTL. An expired cache is refetched on the next lookup. A
//! `kid` missing from a fresh cache triggers one refetch, at most once per
//! refetch cooldown, so keys published by a rotation are accepted before the
//! TTL runs out.
//!
//! # Security
//!
//! - Keys are cached to keep the issuer off the request path
//! - Unknown `kid` values cannot force more than one fetch per cooldown
//! - A JWKS outage is an internal error, not a 401: the caller's token was
//!   never judged

use crate::errors::ReportError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Minimum time between fetches triggered by an unknown `kid`.
const DEFAULT_REFETCH_COOLDOWN: Duration = Duration::from_secs(30);

/// HTTP timeout for JWKS fetches.
pub(crate) const JWKS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the JWKS endpoint.
///
/// Only the members needed for RSA and OKP signature keys are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm ("RS256" or "EdDSA"), if the issuer states it.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// OKP curve name ("Ed25519").
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Thread-safe JWKS fetcher with a TTL cache.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
    refetch_cooldown: Duration,
}

fn unknown_signing_key() -> ReportError {
    ReportError::Authentication("Unknown signing key".to_string())
}

impl JwksClient {
    /// Create a JWKS client with the default TTL.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a JWKS client with a custom cache TTL.
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(JWKS_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "report.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
            refetch_cooldown: DEFAULT_REFETCH_COOLDOWN,
        }
    }

    /// Set the minimum time between refetches caused by an unknown `kid`.
    pub fn with_refetch_cooldown(mut self, cooldown: Duration) -> Self {
        self.refetch_cooldown = cooldown;
        self
    }

    /// Get a JWK by key ID.
    ///
    /// The key set is fetched when the cache is empty or stale, or when `kid`
    /// is unknown and the cache is older than the refetch cooldown.
    ///
    /// # Errors
    ///
    /// - `ReportError::Internal` if the JWKS cannot be fetched or parsed
    /// - `ReportError::Authentication` if no key has this `kid`
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, ReportError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::trace!(target: "report.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    if cached.fetched_at.elapsed() < self.refetch_cooldown {
                        tracing::debug!(target: "report.auth.jwks", kid = %kid, "Key not found in JWKS cache, refetch cooling down");
                        return Err(unknown_signing_key());
                    }
                    tracing::debug!(target: "report.auth.jwks", kid = %kid, "Key not found in JWKS cache, refetching");
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "report.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(unknown_signing_key())
    }

    /// Fetch the key set and replace the cache.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), ReportError> {
        tracing::debug!(target: "report.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "report.auth.jwks", error = %e, "Failed to fetch JWKS");
                ReportError::Internal(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(
                target: "report.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(ReportError::Internal(format!(
                "JWKS endpoint returned {status}"
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "report.auth.jwks", error = %e, "Failed to parse JWKS response");
            ReportError::Internal(format!("Invalid JWKS body: {e}"))
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "report.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });

        Ok(())
    }
}

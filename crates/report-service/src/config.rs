//! Report service configuration.
//!
//! Configuration is loaded from environment variables. The M2M client secret
//! is held as a `SecretString` and redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3010";

/// Default claim name holding the user's roles.
pub const DEFAULT_ROLES_CLAIM_NAMESPACE: &str = "http://schemas.myapp.com/roles";

/// Default JWKS cache TTL in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Scopes requested for the Management API token.
pub const MANAGEMENT_API_SCOPE: &str = "read:clients read:actions";

/// Report service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:3010").
    pub bind_address: String,

    /// Base URL of the identity provider, e.g. `https://tenant.auth0.com`.
    /// Trailing slashes are stripped.
    pub issuer_base_url: String,

    /// Expected `aud` of inbound user tokens.
    pub audience: String,

    /// M2M client ID for the Management API.
    pub m2m_client_id: String,

    /// M2M client secret - redacted in Debug output.
    pub m2m_client_secret: SecretString,

    /// Management API audience, sent verbatim in the client-credentials
    /// grant. Also the API base URL.
    pub management_api_audience: String,

    /// Role a user must hold to read the report.
    pub required_role: String,

    /// Claim name under which the issuer places the user's roles.
    pub roles_claim_namespace: String,

    /// Allowed CORS origin.
    pub frontend_url: String,

    /// JWT clock skew tolerance in seconds.
    pub jwt_clock_skew_seconds: i64,

    /// How long fetched signing keys are trusted.
    pub jwks_cache_ttl_seconds: u64,

    /// Seconds to wait after a shutdown signal before exiting.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("issuer_base_url", &self.issuer_base_url)
            .field("audience", &self.audience)
            .field("m2m_client_id", &self.m2m_client_id)
            .field("m2m_client_secret", &"[REDACTED]")
            .field("management_api_audience", &self.management_api_audience)
            .field("required_role", &self.required_role)
            .field("roles_claim_namespace", &self.roles_claim_namespace)
            .field("frontend_url", &self.frontend_url)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidJwksCacheTtl(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),

    #[error("Invalid roles claim namespace: {0}")]
    InvalidRolesClaimNamespace(String),

    #[error("Invalid FRONTEND_URL: {0}")]
    InvalidFrontendUrl(String),
}

/// Fetch a required variable; empty counts as missing.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let issuer_base_url = required(vars, "ISSUER_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let audience = required(vars, "AUDIENCE")?;
        let m2m_client_id = required(vars, "AUTH0_M2M_CLIENT_ID")?;
        let m2m_client_secret = SecretString::from(required(vars, "AUTH0_M2M_CLIENT_SECRET")?);

        let management_api_audience = required(vars, "AUTH0_AUDIENCE_MANAGEMENT_API")?;

        let required_role = required(vars, "REQUIRED_ROLE")?;

        let frontend_url = required(vars, "FRONTEND_URL")?;
        if frontend_url == "*" || axum::http::HeaderValue::from_str(&frontend_url).is_err() {
            return Err(ConfigError::InvalidFrontendUrl(format!(
                "'{}' is not a valid origin header value",
                frontend_url
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let roles_claim_namespace = match vars.get("ROLES_CLAIM_NAMESPACE") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidRolesClaimNamespace(
                    "ROLES_CLAIM_NAMESPACE must not be empty".to_string(),
                ));
            }
            Some(value) => value.clone(),
            None => DEFAULT_ROLES_CLAIM_NAMESPACE.to_string(),
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let max = i64::try_from(MAX_CLOCK_SKEW.as_secs()).unwrap_or(i64::MAX);
            if value > max {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    max, value
                )));
            }

            value
        } else {
            i64::try_from(DEFAULT_CLOCK_SKEW.as_secs()).unwrap_or(300)
        };

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            bind_address,
            issuer_base_url,
            audience,
            m2m_client_id,
            m2m_client_secret,
            management_api_audience,
            required_role,
            roles_claim_namespace,
            frontend_url,
            jwt_clock_skew_seconds,
            jwks_cache_ttl_seconds,
            drain_seconds,
        })
    }

    /// Issuer's JWKS endpoint.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer_base_url)
    }

    /// Issuer's OAuth token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.issuer_base_url)
    }

    /// Accepted `iss` values: the base URL with and without a trailing slash.
    pub fn accepted_issuers(&self) -> [String; 2] {
        [
            self.issuer_base_url.clone(),
            format!("{}/", self.issuer_base_url),
        ]
    }

    /// JWKS cache TTL as a `Duration`.
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }
}

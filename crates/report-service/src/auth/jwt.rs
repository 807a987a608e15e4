//! JWT validation for user access tokens.
//!
//! Validates bearer tokens against the identity provider's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - The key type from the JWKS decides the algorithm: RSA keys verify
//!   RS256 only, OKP keys verify EdDSA only
//! - `exp`, `aud` and `iss` are required and validated; `iat`, when present,
//!   may not be further in the future than the clock skew
//! - Every failure maps to the same `Authentication` error; the reason is
//!   logged at debug level

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::ReportError;
use common::clock::{Clock, SystemClock};
use common::jwt::{decode_jwk_component, inspect_header, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

fn invalid_token(reason: &str) -> ReportError {
    ReportError::Authentication(reason.to_string())
}

/// JWT validator using the issuer's JWKS.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,

    /// Expected `aud`.
    audience: String,

    /// Accepted `iss` values.
    issuers: Vec<String>,

    /// Claim name holding the roles array.
    roles_namespace: String,

    /// Clock skew tolerance for `exp` leeway and `iat`.
    clock_skew: Duration,

    clock: Arc<dyn Clock>,
}

impl JwtValidator {
    /// Create a validator reading the system clock.
    pub fn new(
        jwks_client: Arc<JwksClient>,
        audience: String,
        issuers: Vec<String>,
        roles_namespace: String,
        clock_skew_seconds: i64,
    ) -> Self {
        Self {
            jwks_client,
            audience,
            issuers,
            roles_namespace,
            clock_skew: Duration::from_secs(u64::try_from(clock_skew_seconds).unwrap_or(0)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for `iat` checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate a JWT and return its claims with roles resolved.
    ///
    /// # Errors
    ///
    /// - `ReportError::Authentication` for any problem with the token
    /// - `ReportError::Internal` if the JWKS cannot be fetched
    #[instrument(skip_all, name = "report.auth.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, ReportError> {
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "report.auth.jwt", error = ?e, "Token header rejected");
            invalid_token("Malformed token")
        })?;

        let jwk = self.jwks_client.get_key(&header.kid).await?;

        let claims = self.verify_token(token, header.alg, &jwk)?;

        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.clock_skew, self.clock.now()) {
                tracing::debug!(target: "report.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(invalid_token("Token issued in the future"));
            }
        }

        tracing::debug!(target: "report.auth.jwt", "Token validated successfully");
        Ok(claims.with_roles_from(&self.roles_namespace))
    }

    /// Verify signature and registered claims.
    fn verify_token(&self, token: &str, alg: Algorithm, jwk: &Jwk) -> Result<Claims, ReportError> {
        let decoding_key = decoding_key_for(jwk, alg)?;

        let mut validation = Validation::new(alg);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&self.issuers);
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.leeway = self.clock_skew.as_secs();

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "report.auth.jwt", error = %e, "Token verification failed");
            invalid_token("Token verification failed")
        })?;

        Ok(token_data.claims)
    }
}

/// Build the verification key for `alg` from a JWK, refusing mismatches.
fn decoding_key_for(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, ReportError> {
    match (jwk.kty.as_str(), alg) {
        ("RSA", Algorithm::RS256) => {
            if jwk.alg.as_deref().is_some_and(|a| a != "RS256") {
                tracing::warn!(target: "report.auth.jwt", kid = %jwk.kid, "RSA JWK advertises a different algorithm");
                return Err(invalid_token("Key algorithm mismatch"));
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                tracing::error!(target: "report.auth.jwt", kid = %jwk.kid, "RSA JWK missing n or e");
                return Err(invalid_token("Incomplete key"));
            };
            DecodingKey::from_rsa_components(n, e).map_err(|e| {
                tracing::error!(target: "report.auth.jwt", error = %e, "Invalid RSA key components");
                invalid_token("Invalid key")
            })
        }
        ("OKP", Algorithm::EdDSA) => {
            if jwk.alg.as_deref().is_some_and(|a| a != "EdDSA")
                || jwk.crv.as_deref().is_some_and(|c| c != "Ed25519")
            {
                tracing::warn!(target: "report.auth.jwt", kid = %jwk.kid, "OKP JWK is not an Ed25519 signing key");
                return Err(invalid_token("Key algorithm mismatch"));
            }
            let x = jwk.x.as_deref().ok_or_else(|| {
                tracing::error!(target: "report.auth.jwt", kid = %jwk.kid, "JWK missing x field");
                invalid_token("Incomplete key")
            })?;
            let public_key = decode_jwk_component(x).map_err(|e| {
                tracing::error!(target: "report.auth.jwt", error = %e, "Invalid public key encoding");
                invalid_token("Invalid key")
            })?;
            Ok(DecodingKey::from_ed_der(&public_key))
        }
        (kty, alg) => {
            tracing::debug!(
                target: "report.auth.jwt",
                kty = %kty,
                alg = ?alg,
                "Token algorithm not allowed for key type"
            );
            Err(invalid_token("Unsupported algorithm"))
        }
    }
}

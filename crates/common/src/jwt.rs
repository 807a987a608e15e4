//! JWT helpers shared by token validators.
//!
//! - Size limit checked before any parsing
//! - Header inspection (`kid`, `alg`) for JWKS key lookup
//! - `iat` validation with clock skew tolerance
//!
//! Signature, `exp`, `aud` and `iss` checks are done by `jsonwebtoken`
//! in the service's validator once the key is known.
//!
//! # Security
//!
//! - Error messages are deliberately identical for every variant so callers
//!   can't probe which check failed. Details go to debug logs.
//! - Nothing here verifies a signature. [`inspect_header`] output must only
//!   be used to select a key from a trusted JWKS.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted JWT size in bytes (8KB).
///
/// Identity provider access tokens with a handful of custom claims are well
/// under 2KB. Anything above this is rejected before base64 decoding.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors from pre-verification token checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Not a three-part compact JWS, or the header is not valid base64url JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// `iat` is further in the future than the allowed clock skew.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header Inspection
// =============================================================================

/// The header fields needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID to look up in the JWKS.
    pub kid: String,

    /// Algorithm the token claims to be signed with.
    pub alg: Algorithm,
}

/// Read `kid` and `alg` from a JWT header without verifying anything.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not `header.payload.signature`, bad base64, bad JSON,
///   or an algorithm `jsonwebtoken` doesn't know
/// - `MissingKid` - `kid` absent or empty
pub fn inspect_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let parts = token.split('.').count();
    if parts != 3 {
        tracing::debug!(target: "common.jwt", parts, "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    let header = jsonwebtoken::decode_header(token).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header");
        JwtValidationError::MalformedToken
    })?;

    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader {
        kid,
        alg: header.alg,
    })
}

// =============================================================================
// Claim Checks
// =============================================================================

/// Reject an `iat` more than `clock_skew` ahead of `now`.
///
/// `jsonwebtoken` validates `exp`/`nbf` but not `iat`; a token issued in the
/// future points at a skewed issuer clock or a forged token.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    // Bounded by MAX_CLOCK_SKEW in configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat,
            now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode a base64url (unpadded) JWK member such as an OKP `x` coordinate.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the input is not valid base64url.
pub fn decode_jwk_component(b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(b64url)
}

// =============================================================================
// Tests
// =============================================================================

//! Authentication middleware for the protected route.
//!
//! Extracts the Bearer token from the Authorization header, validates it
//! against the issuer's JWKS, and injects the verified `Claims` into request
//! extensions for the role check and handler.

use crate::auth::{Claims, JwtValidator};
use crate::errors::ReportError;
use crate::pipeline::{fail, PipelineStage};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Extract the Bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively; the token must be non-empty.
fn extract_bearer_token(req: &Request) -> Result<&str, ReportError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "report.middleware.auth", "Missing Authorization header");
            ReportError::Authentication("Missing Authorization header".to_string())
        })?;

    match auth_header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => {
            tracing::debug!(target: "report.middleware.auth", "Invalid Authorization header format");
            Err(ReportError::Authentication(
                "Invalid Authorization header format".to_string(),
            ))
        }
    }
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 if the token is missing or invalid
/// - 500 if the signing keys cannot be fetched
/// - Otherwise continues with `Claims` in extensions
#[instrument(skip_all, name = "report.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ReportError> {
    let token = extract_bearer_token(&req).map_err(|e| fail(PipelineStage::Authentication, e))?;

    let claims = state
        .jwt_validator
        .validate(token)
        .await
        .map_err(|e| fail(PipelineStage::Authentication, e))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extension trait for reading verified claims from a request.
pub trait ClaimsExt {
    /// Claims inserted by `require_auth`, or `None` if it did not run.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}

//! Role authorization for the protected route.
//!
//! Runs after `require_auth` and checks the verified claims for the
//! configured role.

use crate::auth::Claims;
use crate::errors::ReportError;
use crate::middleware::auth::ClaimsExt;
use crate::pipeline::{fail, PipelineStage};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the role middleware.
#[derive(Clone)]
pub struct RoleState {
    /// Role a user must hold.
    pub required_role: String,
}

/// Check that `claims` carry `required_role`.
///
/// # Errors
///
/// - `Authentication` if there are no claims (authentication did not run)
/// - `Authorization` if the roles claim is absent, malformed, or lacks the role
pub fn authorize(claims: Option<&Claims>, required_role: &str) -> Result<(), ReportError> {
    let Some(claims) = claims else {
        tracing::warn!(target: "report.middleware.role", "Role check reached without verified claims");
        return Err(ReportError::Authentication(
            "No verified claims on request".to_string(),
        ));
    };

    if claims.has_role(required_role) {
        return Ok(());
    }

    tracing::warn!(
        target: "report.middleware.role",
        required_role = %required_role,
        roles_present = claims.roles.is_some(),
        "User does not have required role, access denied"
    );
    Err(ReportError::Authorization {
        required_role: required_role.to_string(),
    })
}

/// Role middleware.
///
/// # Response
///
/// - 401 if no claims were attached
/// - 403 `Requires <ROLE> role` if the role is missing
#[instrument(skip_all, name = "report.middleware.role")]
pub async fn require_role(
    State(state): State<Arc<RoleState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, ReportError> {
    authorize(req.claims(), &state.required_role)
        .map_err(|e| fail(PipelineStage::Authorization, e))?;

    Ok(next.run(req).await)
}

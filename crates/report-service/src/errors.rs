//! Report service error types.
//!
//! Every pipeline failure ends up here and is turned into a status code and a
//! fixed client-facing message by the `IntoResponse` impl. The wrapped detail
//! strings are for server-side logs only.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::token_cache::TokenError;
use serde::Serialize;
use thiserror::Error;

/// Message returned with every 401.
pub const AUTHENTICATION_REQUIRED_MESSAGE: &str = "Authentication is required";

/// Message returned when a call to the identity provider fails.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Error fetching data from Auth0";

/// Message returned for any other server-side failure.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Report service error type.
///
/// Maps to HTTP status codes:
/// - Authentication: 401 Unauthorized
/// - Authorization: 403 Forbidden
/// - UpstreamAuth, UpstreamApi, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ReportError {
    /// Missing, malformed, or unverifiable bearer credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Valid user without the required role.
    #[error("Missing required role: {required_role}")]
    Authorization { required_role: String },

    /// The M2M token could not be obtained.
    #[error("M2M token unavailable: {0}")]
    UpstreamAuth(String),

    /// A Management API call failed, timed out, or returned a malformed body.
    #[error("Management API error: {0}")]
    UpstreamApi(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ReportError::Authentication(_) => 401,
            ReportError::Authorization { .. } => 403,
            ReportError::UpstreamAuth(_)
            | ReportError::UpstreamApi(_)
            | ReportError::Internal(_) => 500,
        }
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ReportError::Authentication(_) => "authentication",
            ReportError::Authorization { .. } => "authorization",
            ReportError::UpstreamAuth(_) => "upstream_auth",
            ReportError::UpstreamApi(_) => "upstream_api",
            ReportError::Internal(_) => "internal",
        }
    }

    /// The message sent to the client.
    pub fn client_message(&self) -> String {
        match self {
            ReportError::Authentication(_) => AUTHENTICATION_REQUIRED_MESSAGE.to_string(),
            ReportError::Authorization { required_role } => {
                format!("Requires {} role", required_role)
            }
            ReportError::UpstreamAuth(_) | ReportError::UpstreamApi(_) => {
                UPSTREAM_FAILURE_MESSAGE.to_string()
            }
            ReportError::Internal(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<TokenError> for ReportError {
    fn from(err: TokenError) -> Self {
        ReportError::UpstreamAuth(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReportError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ReportError::Authorization { .. } => StatusCode::FORBIDDEN,
            ReportError::UpstreamAuth(detail) | ReportError::UpstreamApi(detail) => {
                tracing::error!(target: "report.errors", error = %detail, "Identity provider call failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ReportError::Internal(detail) => {
                tracing::error!(target: "report.errors", error = %detail, "Unexpected error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            message: self.client_message(),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer error=\"invalid_token\""),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_keeps_detail_for_logs() {
        let error = ReportError::UpstreamApi("clients returned 503".to_string());
        assert_eq!(
            format!("{}", error),
            "Management API error: clients returned 503"
        );

        let error = ReportError::Authorization {
            required_role: "Manager".to_string(),
        };
        assert_eq!(format!("{}", error), "Missing required role: Manager");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ReportError::Authentication("x".into()).status_code(), 401);
        assert_eq!(
            ReportError::Authorization {
                required_role: "Manager".into()
            }
            .status_code(),
            403
        );
        assert_eq!(ReportError::UpstreamAuth("x".into()).status_code(), 500);
        assert_eq!(ReportError::UpstreamApi("x".into()).status_code(), 500);
        assert_eq!(ReportError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_token_error_maps_to_upstream_auth() {
        let error: ReportError = TokenError::AuthenticationRejected("Status 401".into()).into();
        assert!(matches!(error, ReportError::UpstreamAuth(_)));
        assert_eq!(error.client_message(), UPSTREAM_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_authentication_response() {
        let response =
            ReportError::Authentication("Missing Authorization header".into()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.starts_with("Bearer"));
        assert!(www_auth.contains("invalid_token"));

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"message": "Authentication is required"}));
    }

    #[tokio::test]
    async fn test_authorization_response_names_role() {
        let response = ReportError::Authorization {
            required_role: "Manager".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"message": "Requires Manager role"}));
    }

    #[tokio::test]
    async fn test_upstream_responses_hide_detail() {
        for error in [
            ReportError::UpstreamAuth("token endpoint returned 401".into()),
            ReportError::UpstreamApi("clients returned 503".into()),
        ] {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let body = read_body_json(response.into_body()).await;
            assert_eq!(
                body,
                serde_json::json!({"message": "Error fetching data from Auth0"})
            );
        }
    }

    #[tokio::test]
    async fn test_internal_response() {
        let response = ReportError::Internal("JWKS unreachable".into()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(
            body,
            serde_json::json!({"message": "An unexpected error occurred"})
        );
    }
}

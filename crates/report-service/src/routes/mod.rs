//! HTTP routes for the report service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator};
use crate::config::{Config, MANAGEMENT_API_SCOPE};
use crate::errors::ReportError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, require_role, AuthState, RoleState};
use crate::services::{HttpManagementClient, ReportService};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use common::token_cache::{ClientCredentialsConfig, ClientCredentialsIssuer, TokenCache};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Whole-request timeout.
///
/// Exceeds the worst-case upstream chain of one JWKS fetch, one token
/// issuance and the concurrent collection fetches.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Report aggregation over the Management API.
    pub report_service: Arc<ReportService>,
}

impl AppState {
    /// Wire the M2M token cache and Management API client from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Internal` if an HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, ReportError> {
        let issuer = ClientCredentialsIssuer::new(ClientCredentialsConfig::new(
            config.token_url(),
            config.m2m_client_id.clone(),
            config.m2m_client_secret.clone(),
            config.management_api_audience.clone(),
            MANAGEMENT_API_SCOPE.to_string(),
        ))
        .map_err(|e| ReportError::Internal(format!("Failed to create token issuer: {e}")))?;

        let token_cache = Arc::new(TokenCache::new(Arc::new(issuer)));
        let management = Arc::new(HttpManagementClient::new(
            config.management_api_audience.clone(),
        )?);

        Ok(Self {
            config,
            report_service: Arc::new(ReportService::new(token_cache, management)),
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/report/applications-actions` - requires a valid token holding the
///   configured role
/// - CORS for the configured frontend origin
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - [`REQUEST_TIMEOUT`] request timeout, answered as a JSON 500
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let config = &state.config;

    let jwks_client = Arc::new(JwksClient::with_ttl(
        config.jwks_url(),
        config.jwks_cache_ttl(),
    ));
    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        config.audience.clone(),
        config.accepted_issuers().to_vec(),
        config.roles_claim_namespace.clone(),
        config.jwt_clock_skew_seconds,
    ));
    let auth_state = Arc::new(AuthState { jwt_validator });
    let role_state = Arc::new(RoleState {
        required_role: config.required_role.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            HeaderValue::from_str(&config.frontend_url).ok(),
        ))
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes. The last route_layer runs first: authenticate, then
    // check the role.
    let protected_routes = Router::new()
        .route(
            "/api/report/applications-actions",
            get(handlers::get_applications_actions),
        )
        .route_layer(middleware::from_fn_with_state(role_state, require_role))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer + timeout mapping (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights, tag responses
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    let routes = public_routes.merge(metrics_routes).merge(protected_routes);

    with_request_timeout(routes, REQUEST_TIMEOUT)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// Time out requests after `timeout`.
///
/// `TimeoutLayer` answers with a bodyless 408; that is rewritten to the
/// internal-error response so every failure carries a `message`.
fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(timeout_as_internal_error))
}

async fn timeout_as_internal_error(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!(target: "report.routes", "Request timed out");
        return ReportError::Internal("request timed out".to_string()).into_response();
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ClientRecord;
    use crate::services::MockManagementApi;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use common::secret::SecretString;
    use common::token_cache::{IssuedToken, TokenError, TokenIssuer};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use report_test_utils::{
        MockAuth0, RsaTestKey, TestTokenBuilder, TEST_AUDIENCE, TEST_M2M_TOKEN,
        TEST_ROLES_NAMESPACE,
    };
    use tower::ServiceExt;

    const REPORT_PATH: &str = "/api/report/applications-actions";

    struct FixedIssuer;

    #[async_trait]
    impl TokenIssuer for FixedIssuer {
        async fn issue(&self) -> Result<IssuedToken, TokenError> {
            Ok(IssuedToken {
                access_token: SecretString::from("m2m"),
                expires_in: 3600,
            })
        }
    }

    /// Router with real auth against `auth0` and an in-memory Management API.
    fn router(auth0: &MockAuth0) -> Router {
        let config = Config::from_vars(&auth0.config_vars()).unwrap();
        let api = MockManagementApi::with_data(
            vec![ClientRecord {
                client_id: "c1".to_string(),
                name: "App1".to_string(),
                description: None,
            }],
            vec![],
        );
        let cache = Arc::new(TokenCache::new(Arc::new(FixedIssuer)));
        let state = Arc::new(AppState {
            config,
            report_service: Arc::new(ReportService::new(cache, Arc::new(api))),
        });
        build_routes(state, PrometheusBuilder::new().build_recorder().handle())
    }

    async fn send(app: Router, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri(REPORT_PATH);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_health_route() {
        let auth0 = MockAuth0::start().await;
        let response = router(&auth0)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "OK");
    }

    #[tokio::test]
    async fn test_authentication_runs_before_role_check() {
        let auth0 = MockAuth0::start().await;

        let (status, body) = send(router(&auth0), None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication is required");
    }

    #[tokio::test]
    async fn test_role_check_sees_verified_claims() {
        let auth0 = MockAuth0::start().await;
        let key = RsaTestKey::primary();
        auth0.mount_jwks(vec![key.jwk()]).await;

        let without_role = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE).sign_rs256(&key);
        let (status, body) = send(router(&auth0), Some(&without_role)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Requires Manager role");

        let with_role = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE)
            .roles_claim(TEST_ROLES_NAMESPACE, &["Manager"])
            .sign_rs256(&key);
        let (status, body) = send(router(&auth0), Some(&with_role)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["applications"][0]["client_id"], "c1");
    }

    #[tokio::test]
    async fn test_app_state_sends_management_audience_verbatim() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, ResponseTemplate};

        let auth0 = MockAuth0::start().await;
        let audience = format!("{}/api/v2", auth0.server().uri());
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(serde_json::json!({ "audience": audience })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": TEST_M2M_TOKEN,
                "token_type": "Bearer",
                "expires_in": 86_400,
            })))
            .expect(1)
            .mount(auth0.server())
            .await;
        auth0
            .mount_clients(serde_json::json!([{"client_id": "c1", "name": "App1"}]))
            .await;
        auth0.mount_actions(serde_json::json!([])).await;

        let mut vars = auth0.config_vars();
        vars.insert("AUTH0_AUDIENCE_MANAGEMENT_API".to_string(), audience);
        let state = AppState::from_config(Config::from_vars(&vars).unwrap()).unwrap();

        let report = state.report_service.build_report().await.unwrap();
        assert_eq!(report.applications.len(), 1);
    }

    #[test]
    fn test_request_timeout_exceeds_upstream_chain() {
        let chain = crate::auth::jwks::JWKS_REQUEST_TIMEOUT
            + common::token_cache::DEFAULT_HTTP_TIMEOUT
            + crate::services::management_client::MANAGEMENT_REQUEST_TIMEOUT;
        assert!(REQUEST_TIMEOUT > chain);
    }

    #[tokio::test]
    async fn test_timeout_answers_json_internal_error() {
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_request_timeout(slow, Duration::from_millis(20));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"message": "An unexpected error occurred"}));
    }
}

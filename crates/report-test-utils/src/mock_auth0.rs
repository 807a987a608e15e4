//! Mock identity provider for tests.
//!
//! One wiremock server plays every upstream role the service talks to:
//! - `GET /.well-known/jwks.json` - signing keys
//! - `POST /oauth/token` - M2M client credentials grant
//! - `GET /api/v2/clients` and `GET /api/v2/actions/actions` - Management API
//!
//! Management API mocks only answer requests carrying [`TEST_M2M_TOKEN`].

use serde_json::{json, Value};
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audience the service expects on user tokens in tests.
pub const TEST_AUDIENCE: &str = "https://report.example.com";

/// Claim name carrying user roles in tests.
pub const TEST_ROLES_NAMESPACE: &str = "http://schemas.myapp.com/roles";

/// Role the report requires in tests.
pub const TEST_REQUIRED_ROLE: &str = "Manager";

/// M2M client ID configured in tests.
pub const TEST_M2M_CLIENT_ID: &str = "test-m2m-client";

/// M2M client secret configured in tests.
pub const TEST_M2M_CLIENT_SECRET: &str = "test-m2m-secret";

/// Access token issued by the mock token endpoint.
pub const TEST_M2M_TOKEN: &str = "test-m2m-access-token";

/// Frontend origin allowed by CORS in tests.
pub const TEST_FRONTEND_URL: &str = "http://localhost:3000";

const JWKS_PATH: &str = "/.well-known/jwks.json";
const TOKEN_PATH: &str = "/oauth/token";
const CLIENTS_PATH: &str = "/api/v2/clients";
const ACTIONS_PATH: &str = "/api/v2/actions/actions";

/// Running mock identity provider.
pub struct MockAuth0 {
    server: MockServer,
}

impl MockAuth0 {
    /// Start an empty mock; mount the endpoints a test needs.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer base URL (no trailing slash).
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// JWKS endpoint URL.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Management API audience and base URL.
    pub fn management_api_audience(&self) -> String {
        format!("{}/api/v2/", self.server.uri())
    }

    /// The underlying server, for custom mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Environment for `Config::from_vars` pointing every upstream here.
    pub fn config_vars(&self) -> HashMap<String, String> {
        HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("ISSUER_BASE_URL".to_string(), self.issuer()),
            ("AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            (
                "AUTH0_M2M_CLIENT_ID".to_string(),
                TEST_M2M_CLIENT_ID.to_string(),
            ),
            (
                "AUTH0_M2M_CLIENT_SECRET".to_string(),
                TEST_M2M_CLIENT_SECRET.to_string(),
            ),
            (
                "AUTH0_AUDIENCE_MANAGEMENT_API".to_string(),
                self.management_api_audience(),
            ),
            ("REQUIRED_ROLE".to_string(), TEST_REQUIRED_ROLE.to_string()),
            (
                "ROLES_CLAIM_NAMESPACE".to_string(),
                TEST_ROLES_NAMESPACE.to_string(),
            ),
            ("FRONTEND_URL".to_string(), TEST_FRONTEND_URL.to_string()),
            ("DRAIN_SECONDS".to_string(), "0".to_string()),
        ])
    }

    /// Serve `keys` from the JWKS endpoint.
    pub async fn mount_jwks(&self, keys: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Fail the JWKS endpoint with `status`.
    pub async fn mount_jwks_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Issue [`TEST_M2M_TOKEN`] for the configured M2M client.
    pub async fn mount_token(&self, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "client_credentials",
                "client_id": TEST_M2M_CLIENT_ID,
                "client_secret": TEST_M2M_CLIENT_SECRET,
                "audience": self.management_api_audience(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_M2M_TOKEN,
                "token_type": "Bearer",
                "expires_in": expires_in,
            })))
            .mount(&self.server)
            .await;
    }

    /// Fail the token endpoint with `status`.
    pub async fn mount_token_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({
                    "error": "access_denied",
                    "error_description": "Unauthorized"
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve `clients` from `GET clients`.
    pub async fn mount_clients(&self, clients: Value) {
        self.mount_management(CLIENTS_PATH, ResponseTemplate::new(200).set_body_json(clients))
            .await;
    }

    /// Serve `actions` wrapped in `{"actions": [...]}` from `GET actions/actions`.
    pub async fn mount_actions(&self, actions: Value) {
        let total = actions.as_array().map_or(0, Vec::len);
        self.mount_management(
            ACTIONS_PATH,
            ResponseTemplate::new(200).set_body_json(json!({
                "actions": actions,
                "total": total,
                "page": 0,
                "per_page": 50,
            })),
        )
        .await;
    }

    /// Fail `GET clients` with `status`.
    pub async fn mount_clients_failure(&self, status: u16) {
        self.mount_management(CLIENTS_PATH, ResponseTemplate::new(status))
            .await;
    }

    /// Fail `GET actions/actions` with `status`.
    pub async fn mount_actions_failure(&self, status: u16) {
        self.mount_management(ACTIONS_PATH, ResponseTemplate::new(status))
            .await;
    }

    async fn mount_management(&self, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", format!("Bearer {TEST_M2M_TOKEN}").as_str()))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of token endpoint calls so far.
    pub async fn token_request_count(&self) -> usize {
        self.request_count(TOKEN_PATH).await
    }

    /// Number of calls to `route` so far.
    pub async fn request_count(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == route)
            .count()
    }
}

//! Authentication and authorization integration tests.
//!
//! Drives `GET /api/report/applications-actions` through the real router
//! against a `MockAuth0` and checks the 401/403 contract.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use report_test_utils::{
    Ed25519TestKey, MockAuth0, RsaTestKey, TestReportServer, TestTokenBuilder, TEST_AUDIENCE,
    TEST_REQUIRED_ROLE, TEST_ROLES_NAMESPACE,
};
use serde_json::{json, Value};

const REPORT_PATH: &str = "/api/report/applications-actions";

struct Fixture {
    auth0: MockAuth0,
    server: TestReportServer,
    key: RsaTestKey,
}

impl Fixture {
    /// JWKS, token endpoint and empty Management API collections.
    async fn start() -> Self {
        let auth0 = MockAuth0::start().await;
        let key = RsaTestKey::primary();
        auth0.mount_jwks(vec![key.jwk()]).await;
        auth0.mount_token(86_400).await;
        auth0.mount_clients(json!([])).await;
        auth0.mount_actions(json!([])).await;
        let server = TestReportServer::spawn(&auth0).await.unwrap();
        Self { auth0, server, key }
    }

    fn token(&self) -> TestTokenBuilder {
        TestTokenBuilder::new(&self.auth0.issuer(), TEST_AUDIENCE)
    }

    async fn get(&self, authorization: Option<&str>) -> reqwest::Response {
        let mut request = reqwest::Client::new().get(format!("{}{}", self.server.url(), REPORT_PATH));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send().await.unwrap()
    }

    async fn get_with(&self, token: &str) -> reqwest::Response {
        self.get(Some(&format!("Bearer {token}"))).await
    }
}

async fn assert_unauthorized(response: reqwest::Response) {
    assert_eq!(response.status(), 401);
    assert!(response.headers().contains_key("www-authenticate"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "Authentication is required"}));
}

#[tokio::test]
async fn test_missing_authorization_header_is_401() {
    let fixture = Fixture::start().await;

    assert_unauthorized(fixture.get(None).await).await;
    assert_eq!(fixture.auth0.token_request_count().await, 0);
}

#[tokio::test]
async fn test_malformed_authorization_headers_are_401() {
    let fixture = Fixture::start().await;

    for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer not-a-jwt", "token"] {
        assert_unauthorized(fixture.get(Some(value)).await).await;
    }
}

#[tokio::test]
async fn test_invalid_tokens_are_401() {
    let fixture = Fixture::start().await;
    let with_role = |b: TestTokenBuilder| b.roles_claim(TEST_ROLES_NAMESPACE, &[TEST_REQUIRED_ROLE]);

    let tokens = [
        with_role(fixture.token()).expired().sign_rs256(&fixture.key),
        with_role(TestTokenBuilder::new(&fixture.auth0.issuer(), "https://other-api"))
            .sign_rs256(&fixture.key),
        with_role(TestTokenBuilder::new("https://evil.example.com", TEST_AUDIENCE))
            .sign_rs256(&fixture.key),
        with_role(fixture.token()).sign_rs256(&RsaTestKey::foreign_with_kid(&fixture.key.kid)),
        with_role(fixture.token()).sign_eddsa(&Ed25519TestKey::generate("unpublished")),
    ];

    for token in tokens {
        assert_unauthorized(fixture.get_with(&token).await).await;
    }
    assert_eq!(fixture.auth0.token_request_count().await, 0);
}

#[tokio::test]
async fn test_missing_role_is_403() {
    let fixture = Fixture::start().await;

    let cases = [
        fixture.token().sign_rs256(&fixture.key),
        fixture
            .token()
            .roles_claim(TEST_ROLES_NAMESPACE, &["Viewer"])
            .sign_rs256(&fixture.key),
        fixture
            .token()
            .roles_claim(TEST_ROLES_NAMESPACE, &["manager"])
            .sign_rs256(&fixture.key),
        fixture
            .token()
            .claim(TEST_ROLES_NAMESPACE, json!("Manager"))
            .sign_rs256(&fixture.key),
        fixture
            .token()
            .roles_claim("https://other/roles", &[TEST_REQUIRED_ROLE])
            .sign_rs256(&fixture.key),
    ];

    for token in cases {
        let response = fixture.get_with(&token).await;
        assert_eq!(response.status(), 403);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"message": "Requires Manager role"}));
    }

    assert_eq!(fixture.auth0.token_request_count().await, 0);
}

#[tokio::test]
async fn test_required_role_among_others_is_allowed() {
    let fixture = Fixture::start().await;
    let token = fixture
        .token()
        .roles_claim(TEST_ROLES_NAMESPACE, &["Viewer", TEST_REQUIRED_ROLE])
        .sign_rs256(&fixture.key);

    let response = fixture.get_with(&token).await;

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_eddsa_token_is_accepted() {
    let auth0 = MockAuth0::start().await;
    let key = Ed25519TestKey::generate("ed-key-1");
    auth0.mount_jwks(vec![key.jwk()]).await;
    auth0.mount_token(86_400).await;
    auth0.mount_clients(json!([])).await;
    auth0.mount_actions(json!([])).await;
    let server = TestReportServer::spawn(&auth0).await.unwrap();

    let token = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE)
        .roles_claim(TEST_ROLES_NAMESPACE, &[TEST_REQUIRED_ROLE])
        .sign_eddsa(&key);

    let response = reqwest::Client::new()
        .get(format!("{}{}", server.url(), REPORT_PATH))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_jwks_outage_is_500_unexpected_error() {
    let auth0 = MockAuth0::start().await;
    auth0.mount_jwks_failure(503).await;
    let server = TestReportServer::spawn(&auth0).await.unwrap();

    let token = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE)
        .roles_claim(TEST_ROLES_NAMESPACE, &[TEST_REQUIRED_ROLE])
        .sign_rs256(&RsaTestKey::primary());

    let response = reqwest::Client::new()
        .get(format!("{}{}", server.url(), REPORT_PATH))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "An unexpected error occurred"}));
}

//! Builder for signed test JWTs.
//!
//! Claims are kept as a JSON map so tests can add, replace or drop any of
//! them before signing.

use crate::crypto_fixtures::{Ed25519TestKey, RsaTestKey};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default subject of built tokens.
pub const TEST_SUBJECT: &str = "auth0|test-user";

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Builder for signed test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE)
///     .roles_claim(TEST_ROLES_NAMESPACE, &["Manager"])
///     .sign_rs256(&RsaTestKey::primary());
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Claims `sub`, `iss`, `aud`, `iat` (now) and `exp` (now + 1h).
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(TEST_SUBJECT));
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("aud".to_string(), json!(audience));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));
        Self { claims }
    }

    /// Set the subject.
    pub fn for_user(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    /// Put `roles` under the namespaced roles claim.
    pub fn roles_claim(self, namespace: &str, roles: &[&str]) -> Self {
        self.claim(namespace, json!(roles))
    }

    /// Set any claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Expire the token an hour ago, well beyond any clock skew.
    pub fn expired(self) -> Self {
        let now = now();
        self.claim("iat", json!(now - 7200))
            .claim("exp", json!(now - 3600))
    }

    /// Set issued-at timestamp.
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim("iat", json!(timestamp))
    }

    /// Claims as a JSON value.
    pub fn build(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with RS256, labelled with the key's `kid`.
    pub fn sign_rs256(&self, key: &RsaTestKey) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());
        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_pem.as_bytes()).expect("fixture PEM is valid");
        encode(&header, &self.claims, &encoding_key).expect("RS256 signing failed")
    }

    /// Sign with EdDSA, labelled with the key's `kid`.
    pub fn sign_eddsa(&self, key: &Ed25519TestKey) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(key.kid.clone());
        let encoding_key = EncodingKey::from_ed_der(&key.pkcs8);
        encode(&header, &self.claims, &encoding_key).expect("EdDSA signing failed")
    }
}

//! JWT claims structure.
//!
//! Registered claims are typed. The roles claim lives under a configurable
//! namespace key, so it is resolved after decoding into [`Claims::roles`];
//! every non-registered claim stays available in [`Claims::extra`].

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Claims of a verified user access token.
///
/// The `sub` field identifies a user and is redacted in Debug output.
#[derive(Clone, Deserialize)]
pub struct Claims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Space-separated scopes granted to this token.
    #[serde(default)]
    pub scope: Option<String>,

    /// Roles read from the namespaced roles claim.
    ///
    /// `None` when the claim is absent or is not an array of strings.
    #[serde(skip)]
    pub roles: Option<Vec<String>>,

    /// Every other claim, as sent by the issuer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("scope", &self.scope)
            .field("roles", &self.roles)
            .field("extra_claims", &self.extra.len())
            .finish()
    }
}

impl Claims {
    /// Populate `roles` from the claim named `namespace`.
    pub fn with_roles_from(mut self, namespace: &str) -> Self {
        self.roles = match self.extra.get(namespace) {
            None => None,
            Some(value) => {
                let roles = parse_roles(value);
                if roles.is_none() {
                    tracing::debug!(
                        target: "report.auth.claims",
                        namespace = %namespace,
                        "Roles claim is not an array of strings"
                    );
                }
                roles
            }
        };
        self
    }

    /// True if `role` is one of the token's roles (exact, case-sensitive).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles
            .as_ref()
            .is_some_and(|roles| roles.iter().any(|r| r == role))
    }
}

/// Accept only a JSON array whose elements are all strings.
fn parse_roles(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

//! Authentication for user access tokens.
//!
//! - `claims` - Typed claims with namespaced roles
//! - `jwks` - Signing key fetching and caching
//! - `jwt` - Token validation

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::JwksClient;
pub use jwt::JwtValidator;

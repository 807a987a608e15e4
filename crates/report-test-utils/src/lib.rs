//! # Report Test Utilities
//!
//! Shared test utilities for the report service.
//!
//! This crate provides:
//! - Fixed RSA keys and generated Ed25519 keys (`RsaTestKey`, `Ed25519TestKey`)
//! - A JWT builder that signs with those keys (`TestTokenBuilder`)
//! - A mock identity provider with JWKS, token and Management API endpoints
//!   (`MockAuth0`)
//! - Server test harness (`TestReportServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use report_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let auth0 = MockAuth0::start().await;
//!     let key = RsaTestKey::primary();
//!     auth0.mount_jwks(vec![key.jwk()]).await;
//!
//!     let server = TestReportServer::spawn(&auth0).await?;
//!     let token = TestTokenBuilder::new(&auth0.issuer(), TEST_AUDIENCE)
//!         .roles_claim(TEST_ROLES_NAMESPACE, &[TEST_REQUIRED_ROLE])
//!         .sign_rs256(&key);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_auth0;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_auth0::*;
pub use server_harness::*;
pub use token_builders::*;

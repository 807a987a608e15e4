//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`]. `SecretString` prints as `[REDACTED]` under
//! `Debug`, so any struct that derives `Debug` and holds one is safe to pass
//! to `tracing`. Reading the value requires an explicit `expose_secret()`.
//!
//! Used here for:
//! - the M2M client secret loaded from configuration
//! - M2M access tokens held by the token cache
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let token = SecretString::from("eyJhbGciOi...");
//! assert!(!format!("{token:?}").contains("eyJ"));
//! let header = format!("Bearer {}", token.expose_secret());
//! assert!(header.starts_with("Bearer eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};

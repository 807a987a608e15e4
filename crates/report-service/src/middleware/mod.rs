//! HTTP middleware for the report service.
//!
//! - `auth` - Bearer token authentication (pipeline stage 1)
//! - `role` - Required-role authorization (pipeline stage 2)
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod http_metrics;
pub mod role;

pub use auth::{require_auth, AuthState, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
pub use role::{authorize, require_role, RoleState};

//! Report Service Library
//!
//! Serves a report of the identity tenant's applications and the actions
//! that reference them, to callers holding a configured role.
//!
//! Exposed as a library so integration tests and the test harness can build
//! the real router.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod routes;
pub mod services;

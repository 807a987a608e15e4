//! Common utilities shared by the report service crates.

#![warn(clippy::pedantic)]

/// Module for injectable time sources
pub mod clock;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, header inspection, iat checks)
pub mod jwt;

/// Module for the single-slot machine-to-machine token cache
pub mod token_cache;

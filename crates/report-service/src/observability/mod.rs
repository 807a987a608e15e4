//! Observability for the report service.
//!
//! Provides metric definitions and the Prometheus recorder setup.

pub mod metrics;

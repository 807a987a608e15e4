//! HTTP request handlers for the report service.

pub mod health;
pub mod metrics;
pub mod report;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use report::get_applications_actions;

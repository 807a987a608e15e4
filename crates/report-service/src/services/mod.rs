//! Service layer for the report service.
//!
//! # Components
//!
//! - `management_client` - HTTP client for the Management API
//! - `report` - Report aggregation over the Management API

pub mod management_client;
pub mod report;

pub use management_client::{HttpManagementClient, ManagementApi};
// Mock Management API for testing (exposed for integration tests)
#[allow(unused_imports)]
pub use management_client::mock::MockManagementApi;
pub use report::{assemble_report, ReportService};

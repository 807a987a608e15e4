//! Report handler.
//!
//! - `GET /api/report/applications-actions` - applications and the actions
//!   whose code mentions them
//!
//! Authentication and role checks run in middleware before this handler.

use crate::errors::ReportError;
use crate::models::Report;
use crate::pipeline::{fail, PipelineStage};
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/report/applications-actions
///
/// # Response
///
/// - 200 `{"applications": [...]}`
/// - 500 `{"message": "Error fetching data from Auth0"}` if the token or
///   either collection could not be fetched
#[instrument(skip_all, name = "report.handlers.applications_actions")]
pub async fn get_applications_actions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Report>, ReportError> {
    state
        .report_service
        .build_report()
        .await
        .map(Json)
        .map_err(|e| fail(PipelineStage::Aggregation, e))
}

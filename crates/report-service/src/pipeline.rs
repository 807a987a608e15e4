//! Request pipeline stages.
//!
//! A report request moves `Received -> Authenticated -> Authorized ->
//! Aggregating -> Responded`. Each arrow is one layer on the protected route:
//!
//! ```text
//! require_auth  (Authentication)  -> Authenticated
//! require_role  (Authorization)   -> Authorized
//! handler       (Aggregation)     -> Responded
//! ```
//!
//! A failure at any stage short-circuits to an error response carrying the
//! originating `ReportError`; later stages never run. [`PipelineStage`] names
//! the stage a failure happened in so it can be logged and counted.

use crate::errors::ReportError;
use crate::observability::metrics::record_pipeline_failure;
use std::fmt;

/// Stage of the report pipeline that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Bearer token verification.
    Authentication,
    /// Role check on verified claims.
    Authorization,
    /// M2M token, Management API calls, and report assembly.
    Aggregation,
}

impl PipelineStage {
    /// Metric label for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Authentication => "authentication",
            PipelineStage::Authorization => "authorization",
            PipelineStage::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log and count a failure, then hand the error back for responding.
pub fn fail(stage: PipelineStage, error: ReportError) -> ReportError {
    tracing::debug!(
        target: "report.pipeline",
        stage = %stage,
        error_type = error.error_type(),
        status = error.status_code(),
        "Pipeline short-circuited"
    );
    record_pipeline_failure(stage.as_str(), error.error_type());
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::Authentication.as_str(), "authentication");
        assert_eq!(PipelineStage::Authorization.as_str(), "authorization");
        assert_eq!(PipelineStage::Aggregation.as_str(), "aggregation");
        assert_eq!(PipelineStage::Aggregation.to_string(), "aggregation");
    }

    #[test]
    fn test_fail_passes_error_through() {
        let error = fail(
            PipelineStage::Authorization,
            ReportError::Authorization {
                required_role: "Manager".to_string(),
            },
        );

        assert!(
            matches!(&error, ReportError::Authorization { required_role } if required_role == "Manager")
        );
    }
}

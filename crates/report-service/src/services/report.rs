//! Applications/actions report aggregation.
//!
//! Actions carry no reference to the applications they serve. An action is
//! attributed to every application whose `client_id` appears anywhere in the
//! action's source code. Overlapping ids (one a substring of another) can
//! attribute one action to several applications; that is kept as is.

use crate::errors::ReportError;
use crate::models::{
    ActionRecord, ActionSummary, ApplicationEntry, ClientRecord, Report,
    ALL_APPLICATIONS_CLIENT_NAME,
};
use crate::observability::metrics::record_report_build;
use crate::services::management_client::ManagementApi;
use common::token_cache::TokenCache;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Builds the report from the Management API.
pub struct ReportService {
    token_cache: Arc<TokenCache>,
    management: Arc<dyn ManagementApi>,
}

impl ReportService {
    pub fn new(token_cache: Arc<TokenCache>, management: Arc<dyn ManagementApi>) -> Self {
        Self {
            token_cache,
            management,
        }
    }

    /// Fetch clients and actions and assemble the report.
    ///
    /// The two collections are fetched concurrently. Any failure fails the
    /// whole build; no partial report is returned.
    ///
    /// # Errors
    ///
    /// - `UpstreamAuth` if the M2M token cannot be obtained
    /// - `UpstreamApi` if either collection fetch fails
    #[instrument(skip_all, name = "report.services.report.build")]
    pub async fn build_report(&self) -> Result<Report, ReportError> {
        let start = Instant::now();

        match self.fetch_and_assemble().await {
            Ok(report) => {
                let applications = report.applications.len();
                record_report_build("success", Some(applications), start.elapsed());
                info!(
                    target: "report.services.report",
                    applications,
                    "Report built"
                );
                Ok(report)
            }
            Err(e) => {
                record_report_build("error", None, start.elapsed());
                Err(e)
            }
        }
    }

    async fn fetch_and_assemble(&self) -> Result<Report, ReportError> {
        let token = self.token_cache.get_token().await?;

        let (clients, actions) = tokio::try_join!(
            self.management.list_clients(&token),
            self.management.list_actions(&token),
        )?;

        Ok(assemble_report(clients, actions))
    }
}

/// Join clients and actions into the report.
///
/// - Clients named exactly "All Applications" are dropped
/// - Each remaining client gets every action whose code contains its
///   `client_id`, in action order
/// - Client order is preserved
pub fn assemble_report(clients: Vec<ClientRecord>, actions: Vec<ActionRecord>) -> Report {
    let summaries: Vec<ActionSummary> = actions.into_iter().map(ActionSummary::from).collect();

    let applications = clients
        .into_iter()
        .filter(|client| client.name != ALL_APPLICATIONS_CLIENT_NAME)
        .map(|client| {
            let app_actions = summaries
                .iter()
                .filter(|action| action.code.contains(client.client_id.as_str()))
                .cloned()
                .collect();

            ApplicationEntry {
                client_id: client.client_id,
                name: client.name,
                description: client.description,
                app_actions,
            }
        })
        .collect();

    Report { applications }
}

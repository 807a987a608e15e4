//! Management API HTTP client.
//!
//! Reads the two collections the report is built from:
//! - `GET {base}clients`
//! - `GET {base}actions/actions`
//!
//! Both are called with the M2M token as a Bearer credential.
//!
//! # Security
//!
//! - The M2M token is only exposed when building the Authorization header
//! - Timeouts bound every call
//! - Upstream error bodies are logged at debug level, never returned

use crate::errors::ReportError;
use crate::models::{ActionRecord, ActionsPage, ClientRecord};
use crate::observability::metrics::record_management_request;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Request timeout for Management API calls.
pub(crate) const MANAGEMENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for Management API calls.
const MANAGEMENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read access to the Management API.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// List all applications.
    async fn list_clients(&self, token: &SecretString) -> Result<Vec<ClientRecord>, ReportError>;

    /// List all actions.
    async fn list_actions(&self, token: &SecretString) -> Result<Vec<ActionRecord>, ReportError>;
}

/// `ManagementApi` over HTTP.
#[derive(Clone)]
pub struct HttpManagementClient {
    client: Client,
    /// Always ends with `/`.
    base_url: String,
}

impl HttpManagementClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(MANAGEMENT_REQUEST_TIMEOUT)
            .connect_timeout(MANAGEMENT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                error!(target: "report.services.management", error = %e, "Failed to build HTTP client");
                ReportError::Internal(format!("Failed to build HTTP client: {e}"))
            })?;

        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };

        Ok(Self { client, base_url })
    }

    /// GET `{base}{path}` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        token: &SecretString,
    ) -> Result<T, ReportError> {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let result = self.fetch(&url, token).await;

        let status = if result.is_ok() { "success" } else { "error" };
        record_management_request(operation, status, start.elapsed());

        let bytes = result?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(target: "report.services.management", operation, error = %e, "Malformed Management API response");
            ReportError::UpstreamApi(format!("{operation}: malformed body: {e}"))
        })
    }

    async fn fetch(&self, url: &str, token: &SecretString) -> Result<Vec<u8>, ReportError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                warn!(target: "report.services.management", error = %e, timeout = e.is_timeout(), "Management API request failed");
                ReportError::UpstreamApi(format!("request to {url} failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "report.services.management", status = %status, "Management API returned error");
            debug!(target: "report.services.management", body = %body, "Management API error body");
            return Err(ReportError::UpstreamApi(format!("{url} returned {status}")));
        }

        let bytes = response.bytes().await.map_err(|e| {
            warn!(target: "report.services.management", error = %e, "Failed to read Management API response");
            ReportError::UpstreamApi(format!("reading {url} failed: {e}"))
        })?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ManagementApi for HttpManagementClient {
    #[instrument(skip_all, name = "report.services.management.list_clients")]
    async fn list_clients(&self, token: &SecretString) -> Result<Vec<ClientRecord>, ReportError> {
        let clients: Vec<ClientRecord> = self.get_json("list_clients", "clients", token).await?;
        debug!(target: "report.services.management", count = clients.len(), "Fetched clients");
        Ok(clients)
    }

    #[instrument(skip_all, name = "report.services.management.list_actions")]
    async fn list_actions(&self, token: &SecretString) -> Result<Vec<ActionRecord>, ReportError> {
        let page: ActionsPage = self
            .get_json("list_actions", "actions/actions", token)
            .await?;
        debug!(target: "report.services.management", count = page.actions.len(), "Fetched actions");
        Ok(page.actions)
    }
}

/// Mock Management API for tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed collections or fails, and counts calls.
    pub struct MockManagementApi {
        clients: Vec<ClientRecord>,
        actions: Vec<ActionRecord>,
        fail_clients: bool,
        fail_actions: bool,
        call_count: AtomicUsize,
    }

    impl MockManagementApi {
        /// Serve these collections.
        pub fn with_data(clients: Vec<ClientRecord>, actions: Vec<ActionRecord>) -> Self {
            Self {
                clients,
                actions,
                fail_clients: false,
                fail_actions: false,
                call_count: AtomicUsize::new(0),
            }
        }

        /// Fail `list_clients`.
        pub fn failing_clients() -> Self {
            Self {
                fail_clients: true,
                ..Self::with_data(vec![], vec![])
            }
        }

        /// Fail `list_actions`.
        pub fn failing_actions() -> Self {
            Self {
                fail_actions: true,
                ..Self::with_data(vec![], vec![])
            }
        }

        /// Total calls to either method.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ManagementApi for MockManagementApi {
        async fn list_clients(
            &self,
            _token: &SecretString,
        ) -> Result<Vec<ClientRecord>, ReportError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_clients {
                return Err(ReportError::UpstreamApi("Mock clients failure".to_string()));
            }
            Ok(self.clients.clone())
        }

        async fn list_actions(
            &self,
            _token: &SecretString,
        ) -> Result<Vec<ActionRecord>, ReportError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_actions {
                return Err(ReportError::UpstreamApi("Mock actions failure".to_string()));
            }
            Ok(self.actions.clone())
        }
    }
}

//! Test server harness for E2E testing
//!
//! Provides `TestReportServer` for spawning real report service instances
//! wired to a `MockAuth0`.

use crate::mock_auth0::MockAuth0;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use report_service::config::Config;
use report_service::observability::metrics::init_metrics_recorder;
use report_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Handle of the process-wide recorder, shared by every server in a test binary.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            // Another harness in the process may have installed the recorder
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the report service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let auth0 = MockAuth0::start().await;
///     let server = TestReportServer::spawn(&auth0).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestReportServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestReportServer {
    /// Spawn a server whose identity provider and Management API are `auth0`.
    ///
    /// The server binds to 127.0.0.1:0 and runs in the background until
    /// dropped.
    pub async fn spawn(auth0: &MockAuth0) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&auth0.config_vars())
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            AppState::from_config(config.clone())
                .map_err(|e| anyhow::anyhow!("Failed to create app state: {}", e))?,
        );

        let app = routes::build_routes(state, metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestReportServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

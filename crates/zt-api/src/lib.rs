//! Zero Trust assessment API
//!
//! ```text
//!   POST /assessment/run ──▶ ScanService ──▶ AzureConnector ──▶ controls
//!                                 │
//!                                 └──▶ HtmlReportRenderer ──▶ FileReportStore
//!   GET  /reports/:file  ◀──────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod models;
pub mod routes;

use axum::{routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use zt_core::ScanService;
use zt_report::FileReportStore;

pub use models::*;

/// Listen port when `PORT` is unset
pub const DEFAULT_PORT: u16 = 3000;
/// Report directory when `REPORT_DIR` is unset
pub const DEFAULT_REPORT_DIR: &str = "./reports";

/// API state
pub struct AppState {
    /// Scan service shared by all requests
    pub service: Arc<ScanService>,
    /// Store the report route reads from
    pub store: Arc<FileReportStore>,
}

/// Process-level settings for the server binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Listen port
    pub port: u16,
    /// Report directory
    pub report_dir: PathBuf,
    /// Directory of the service principals
    pub tenant_id: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            tenant_id: None,
        }
    }
}

impl ServerSettings {
    /// Settings from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// `PORT`, `REPORT_DIR` and `AZURE_TENANT_ID`; blanks fall back to defaults
    pub fn from_vars<I, K, V>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::default();
        for (k, v) in vars {
            let v = v.as_ref().trim();
            if v.is_empty() {
                continue;
            }
            match k.as_ref() {
                "PORT" => {
                    settings.port = v
                        .parse()
                        .map_err(|e| anyhow::anyhow!("invalid PORT '{}': {}", v, e))?
                }
                "REPORT_DIR" => settings.report_dir = PathBuf::from(v),
                "AZURE_TENANT_ID" => settings.tenant_id = Some(v.to_string()),
                _ => {}
            }
        }
        Ok(settings)
    }
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/assessment", routes::assessment::router())
        .nest("/reports", routes::reports::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use zt_core::{
        EngineConfig, InMemoryInventory, InventoryConnector, InventoryProvider, ProviderError,
        ProviderResult, ScanContext, StaticConnector,
    };
    use zt_report::HtmlReportRenderer;

    struct RejectingConnector;

    #[async_trait]
    impl InventoryConnector for RejectingConnector {
        async fn connect(&self, _ctx: &ScanContext) -> ProviderResult<Arc<dyn InventoryProvider>> {
            Err(ProviderError::Unauthorized("invalid client secret".into()))
        }
    }

    fn server(connector: Arc<dyn InventoryConnector>, dir: &std::path::Path) -> TestServer {
        let store = Arc::new(FileReportStore::new(dir));
        let service = ScanService::new(connector, &EngineConfig::default())
            .with_tenant_id("tenant")
            .with_reporting(Arc::new(HtmlReportRenderer::new().unwrap()), store.clone());
        let state = AppState {
            service: Arc::new(service),
            store,
        };
        TestServer::new(build_router(state)).unwrap()
    }

    fn contoso() -> Arc<dyn InventoryConnector> {
        Arc::new(StaticConnector::new(
            InMemoryInventory::new().with_subscription_name("Contoso"),
        ))
    }

    fn body() -> Value {
        json!({
            "subscriptionId": "0000",
            "clientId": "app",
            "clientSecret": "s3cret",
            "env": "prod"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(contoso(), dir.path()).get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_run_assessment_and_fetch_report() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(contoso(), dir.path());

        let response = server.post("/assessment/run").json(&body()).await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["message"], "ZT Assessment Completed");
        assert_eq!(json["subscriptionName"], "Contoso");
        assert_eq!(json["summary"]["total"], 10);
        assert_eq!(json["results"].as_array().unwrap().len(), 10);

        let path = json["reportPath"].as_str().unwrap();
        assert!(path.starts_with("/reports/Contoso-"));
        assert!(path.ends_with(".html"));

        let report = server.get(path).await;
        report.assert_status_ok();
        assert!(report.text().contains("ZT Assessment Report"));
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = body();
        body["clientSecret"] = json!("  ");

        let response = server(contoso(), dir.path())
            .post("/assessment/run")
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["error"]
            .as_str()
            .unwrap()
            .contains("clientSecret"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(Arc::new(RejectingConnector), dir.path())
            .post("/assessment/run")
            .json(&body())
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let json = response.json::<Value>();
        assert_eq!(json["error"], "ZT Scan failed");
        assert!(json["details"].as_str().unwrap().contains("invalid client secret"));
    }

    #[tokio::test]
    async fn test_report_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.html"), "<html>kept</html>").unwrap();
        let server = server(contoso(), dir.path());

        let found = server.get("/reports/kept.html").await;
        found.assert_status_ok();
        assert_eq!(found.text(), "<html>kept</html>");

        server
            .get("/reports/missing.html")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/reports/..%2Fkept.html")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_settings() {
        let settings = ServerSettings::from_vars([
            ("PORT", "8080"),
            ("REPORT_DIR", "/var/lib/zt/reports"),
            ("AZURE_TENANT_ID", " "),
        ])
        .unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.report_dir, PathBuf::from("/var/lib/zt/reports"));
        assert_eq!(settings.tenant_id, None);

        assert!(ServerSettings::from_vars([("PORT", "http")]).is_err());
    }
}

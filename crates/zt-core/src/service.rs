//! Scan service
//!
//! Entry point behind the HTTP trigger: validate the request, connect an
//! inventory for the subscription, run the controls, summarize, and
//! optionally render and store a report.

use crate::aggregate::summarize;
use crate::config::EngineConfig;
use crate::error::ScanError;
use crate::inventory::InventoryConnector;
use crate::model::{ClientCredentials, ControlResult, ScanContext, ScanSummary};
use crate::orchestrator::Orchestrator;
use crate::report::{ReportInput, ReportRenderer, ReportStore};
use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Inbound scan trigger
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRequest {
    /// Subscription to assess
    pub subscription_id: String,
    /// Service principal application id
    pub client_id: String,
    /// Service principal secret
    pub client_secret: String,
    /// Environment tag, e.g. `PROD`
    #[serde(rename = "env")]
    pub environment: String,
}

impl fmt::Debug for ScanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanRequest")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("environment", &self.environment)
            .finish()
    }
}

/// Completed scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Display name, or the id when unknown
    pub subscription_name: String,
    /// Results in control order
    pub results: Vec<ControlResult>,
    /// Totals over `results`
    pub summary: ScanSummary,
    /// Time spent running controls
    pub duration: Duration,
    /// Public path of the stored report, when reporting is configured
    pub report_path: Option<String>,
}

struct Reporting {
    renderer: Arc<dyn ReportRenderer>,
    store: Arc<dyn ReportStore>,
}

impl Reporting {
    /// Render and store, returning the public path
    async fn publish(&self, input: &ReportInput) -> Result<String, ScanError> {
        let artifact = self
            .renderer
            .render(input)
            .map_err(|e| ScanError::Report(e.to_string()))?;
        self.store
            .store(&artifact)
            .await
            .map_err(|e| ScanError::Report(e.to_string()))
    }
}

/// Validates a request and runs one full assessment
pub struct ScanService {
    connector: Arc<dyn InventoryConnector>,
    orchestrator: Orchestrator,
    tenant_id: Option<String>,
    reporting: Option<Reporting>,
}

fn required(value: &str, field: &'static str) -> Result<String, ScanError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScanError::MissingContext(field));
    }
    Ok(value.to_string())
}

impl ScanService {
    /// Default battery of controls for `config`
    pub fn new(connector: Arc<dyn InventoryConnector>, config: &EngineConfig) -> Self {
        Self::with_orchestrator(connector, Orchestrator::from_config(config))
    }

    /// Custom control battery
    pub fn with_orchestrator(connector: Arc<dyn InventoryConnector>, orchestrator: Orchestrator) -> Self {
        Self {
            connector,
            orchestrator,
            tenant_id: None,
            reporting: None,
        }
    }

    /// Directory (tenant) every service principal authenticates against
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Render and store a report after every scan
    pub fn with_reporting(
        mut self,
        renderer: Arc<dyn ReportRenderer>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        self.reporting = Some(Reporting { renderer, store });
        self
    }

    /// Build the scan context, failing before any control runs
    pub fn context(&self, request: &ScanRequest) -> Result<ScanContext, ScanError> {
        let subscription_id = required(&request.subscription_id, "subscriptionId")?;
        let client_id = required(&request.client_id, "clientId")?;
        let client_secret = required(&request.client_secret, "clientSecret")?;
        let environment = required(&request.environment, "env")?;
        let tenant_id = required(self.tenant_id.as_deref().unwrap_or_default(), "tenantId")?;

        Ok(ScanContext::new(
            subscription_id,
            environment,
            ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            },
        ))
    }

    /// Run a full assessment. Only a bad request or a failed connection is an error.
    pub async fn run(&self, request: ScanRequest) -> Result<ScanOutcome, ScanError> {
        let ctx = self.context(&request)?;
        let inventory = self
            .connector
            .connect(&ctx)
            .await
            .map_err(ScanError::Connect)?;

        let subscription_name = match inventory.subscription_display_name().await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => ctx.subscription_id.clone(),
            Err(e) => {
                warn!("Could not fetch subscription name, using subscription id: {}", e);
                ctx.subscription_id.clone()
            }
        };

        let started = Instant::now();
        let results = self.orchestrator.run(&ctx, inventory.as_ref()).await;
        let duration = started.elapsed();
        let summary = summarize(&results);
        info!(
            "Scan of {} finished in {:.2}s: {} passed, {} failed",
            subscription_name,
            duration.as_secs_f64(),
            summary.passed,
            summary.failed
        );

        // A finished scan is returned even when its report cannot be written
        let report_path = match &self.reporting {
            Some(reporting) => {
                let input = ReportInput {
                    results: results.clone(),
                    summary,
                    subscription_id: ctx.subscription_id.clone(),
                    subscription_name: subscription_name.clone(),
                    scan_duration: duration,
                    generated_at: Utc::now(),
                };
                match reporting.publish(&input).await {
                    Ok(path) => {
                        info!("Report stored at {}", path);
                        Some(path)
                    }
                    Err(e) => {
                        warn!("Scan of {} completed without a report: {}", subscription_name, e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(ScanOutcome {
            subscription_name,
            results,
            summary,
            duration,
            report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ProviderResult};
    use crate::inventory::{InMemoryInventory, InventoryProvider, StaticConnector};
    use crate::model::ControlStatus;
    use crate::report::{RenderError, ReportArtifact};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn request() -> ScanRequest {
        ScanRequest {
            subscription_id: "0000".into(),
            client_id: "app".into(),
            client_secret: "s3cret".into(),
            environment: "dev".into(),
        }
    }

    fn service(inventory: InMemoryInventory) -> ScanService {
        ScanService::new(Arc::new(StaticConnector::new(inventory)), &EngineConfig::default())
            .with_tenant_id("tenant")
    }

    struct Refusing;

    #[async_trait]
    impl InventoryConnector for Refusing {
        async fn connect(&self, _ctx: &ScanContext) -> ProviderResult<Arc<dyn InventoryProvider>> {
            Err(ProviderError::Unauthorized("bad secret".into()))
        }
    }

    struct Plain;

    impl ReportRenderer for Plain {
        fn render(&self, input: &ReportInput) -> Result<ReportArtifact, RenderError> {
            Ok(ReportArtifact {
                file_name: format!("{}.txt", input.subscription_name),
                content: format!("{}/{}", input.summary.passed, input.summary.total),
            })
        }
    }

    #[derive(Default)]
    struct Memory(Mutex<Vec<ReportArtifact>>);

    #[async_trait]
    impl ReportStore for Memory {
        async fn store(&self, artifact: &ReportArtifact) -> Result<String, RenderError> {
            self.0.lock().unwrap().push(artifact.clone());
            Ok(format!("/reports/{}", artifact.file_name))
        }
    }

    struct FullDisk;

    #[async_trait]
    impl ReportStore for FullDisk {
        async fn store(&self, _artifact: &ReportArtifact) -> Result<String, RenderError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    struct Broken;

    impl ReportRenderer for Broken {
        fn render(&self, _input: &ReportInput) -> Result<ReportArtifact, RenderError> {
            Err(RenderError::Template("unclosed block".into()))
        }
    }

    #[test]
    fn test_missing_context() {
        let svc = service(InMemoryInventory::new());

        let mut req = request();
        req.client_secret = "  ".into();
        assert!(matches!(svc.context(&req), Err(ScanError::MissingContext("clientSecret"))));

        let mut req = request();
        req.environment.clear();
        assert!(matches!(svc.context(&req), Err(ScanError::MissingContext("env"))));

        let no_tenant = ScanService::new(
            Arc::new(StaticConnector::new(InMemoryInventory::new())),
            &EngineConfig::default(),
        );
        assert!(matches!(no_tenant.context(&request()), Err(ScanError::MissingContext("tenantId"))));
    }

    #[test]
    fn test_request_json_and_redaction() {
        let req: ScanRequest = serde_json::from_str(
            r#"{"subscriptionId":"0000","clientId":"app","clientSecret":"s3cret","env":"prod"}"#,
        )
        .unwrap();
        assert_eq!(req.environment, "prod");
        assert!(!format!("{:?}", req).contains("s3cret"));
    }

    #[tokio::test]
    async fn test_run_falls_back_to_subscription_id() {
        let outcome = service(InMemoryInventory::new()).run(request()).await.unwrap();

        assert_eq!(outcome.subscription_name, "0000");
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.summary.total, 10);
        assert!(outcome.report_path.is_none());
    }

    #[tokio::test]
    async fn test_run_with_report() {
        let store = Arc::new(Memory::default());
        let svc = service(InMemoryInventory::new().with_subscription_name("Contoso Prod"))
            .with_reporting(Arc::new(Plain), store.clone());

        let outcome = svc.run(request()).await.unwrap();

        assert_eq!(outcome.subscription_name, "Contoso Prod");
        assert_eq!(outcome.report_path.as_deref(), Some("/reports/Contoso Prod.txt"));
        assert_eq!(store.0.lock().unwrap()[0].content, format!("{}/10", outcome.summary.passed));
        assert!(outcome.results.iter().all(|r| r.status == ControlStatus::Pass));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_results() {
        let svc = service(InMemoryInventory::new()).with_reporting(Arc::new(Plain), Arc::new(FullDisk));

        let outcome = svc.run(request()).await.unwrap();

        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.summary.total, 10);
        assert!(outcome.report_path.is_none());
    }

    #[tokio::test]
    async fn test_render_failure_keeps_results() {
        let store = Arc::new(Memory::default());
        let svc = service(InMemoryInventory::new()).with_reporting(Arc::new(Broken), store.clone());

        let outcome = svc.run(request()).await.unwrap();

        assert_eq!(outcome.results.len(), 10);
        assert!(outcome.report_path.is_none());
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let svc = ScanService::new(Arc::new(Refusing), &EngineConfig::default()).with_tenant_id("t");
        assert!(matches!(svc.run(request()).await, Err(ScanError::Connect(_))));
    }
}

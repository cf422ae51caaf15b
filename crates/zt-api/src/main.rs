//! Zero Trust assessment server

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zt_api::{build_router, AppState, ServerSettings};
use zt_azure::{AzureConnector, AzureSettings};
use zt_core::{EngineConfig, ScanService};
use zt_report::{FileReportStore, HtmlReportRenderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ZT assessment API v{}", env!("CARGO_PKG_VERSION"));

    let settings = ServerSettings::from_env()?;
    let engine = EngineConfig::from_env().context("invalid engine configuration")?;
    let connector = AzureConnector::new(AzureSettings::from_env())
        .context("failed to build Azure connector")?;

    let store = Arc::new(FileReportStore::new(&settings.report_dir));
    let mut service = ScanService::new(Arc::new(connector), &engine)
        .with_reporting(Arc::new(HtmlReportRenderer::new()?), store.clone());
    match &settings.tenant_id {
        Some(tenant) => service = service.with_tenant_id(tenant),
        None => tracing::warn!("AZURE_TENANT_ID is not set; assessments will be rejected"),
    }

    let app = build_router(AppState {
        service: Arc::new(service),
        store,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;
    tracing::info!(
        "Server is running at http://localhost:{} (reports in {})",
        settings.port,
        settings.report_dir.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}

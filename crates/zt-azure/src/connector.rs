//! Per-scan connector

use crate::arm::ArmClient;
use crate::credential::ClientSecretCredential;
use crate::inventory::AzureInventory;
use crate::{AzureError, AzureSettings};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zt_core::{InventoryConnector, InventoryProvider, ProviderError, ProviderResult, ScanContext};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an ARM inventory from the scan's service principal
#[derive(Debug, Clone)]
pub struct AzureConnector {
    settings: AzureSettings,
    http: Client,
}

impl AzureConnector {
    /// Connector sharing one HTTP client across scans
    pub fn new(settings: AzureSettings) -> Result<Self, AzureError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { settings, http })
    }

    /// Endpoints in use
    pub fn settings(&self) -> &AzureSettings {
        &self.settings
    }
}

#[async_trait]
impl InventoryConnector for AzureConnector {
    async fn connect(&self, ctx: &ScanContext) -> ProviderResult<Arc<dyn InventoryProvider>> {
        if ctx.credentials.tenant_id.trim().is_empty() {
            return Err(ProviderError::Unauthorized("tenant id is not configured".into()));
        }

        let credential = ClientSecretCredential::new(
            self.http.clone(),
            &self.settings.authority_host,
            &ctx.credentials,
        );
        let arm = ArmClient::new(
            self.http.clone(),
            &self.settings.management_endpoint,
            Arc::new(credential),
        );
        info!(
            "Connected ARM inventory for subscription {} ({})",
            ctx.subscription_id, self.settings.management_endpoint
        );
        Ok(Arc::new(AzureInventory::new(arm, ctx.subscription_id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zt_core::ClientCredentials;

    #[tokio::test]
    async fn test_connect_authenticates_with_scan_principal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "expires_in": 3600,
                "access_token": "arm-token"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/0000"))
            .and(header("authorization", "Bearer arm-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "displayName": "Dev" })))
            .mount(&server)
            .await;

        let connector = AzureConnector::new(AzureSettings {
            authority_host: server.uri(),
            management_endpoint: server.uri(),
        })
        .unwrap();
        let ctx = ScanContext::new(
            "0000",
            "dev",
            ClientCredentials {
                tenant_id: "tenant-1".into(),
                client_id: "app".into(),
                client_secret: "secret".into(),
            },
        );

        let inventory = connector.connect(&ctx).await.unwrap();
        assert_eq!(inventory.subscription_display_name().await.unwrap().as_deref(), Some("Dev"));
    }

    #[tokio::test]
    async fn test_connect_requires_tenant() {
        let connector = AzureConnector::new(AzureSettings::default()).unwrap();
        let ctx = ScanContext::new("0000", "dev", ClientCredentials::default());
        assert!(matches!(connector.connect(&ctx).await, Err(ProviderError::Unauthorized(_))));
    }
}

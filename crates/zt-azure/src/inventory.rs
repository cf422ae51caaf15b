//! ARM-backed resource inventory

use crate::arm::ArmClient;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use zt_core::inventory::paths;
use zt_core::{InventoryProvider, ProviderError, ProviderResult, Resource, ResourceStream};

/// Generic resource listing
pub const RESOURCES_API_VERSION: &str = "2021-04-01";
/// Subscription lookup
pub const SUBSCRIPTION_API_VERSION: &str = "2022-12-01";
/// Diagnostic settings extension
pub const DIAGNOSTIC_SETTINGS_API_VERSION: &str = "2021-05-01-preview";

/// api-version per resource provider type
static API_VERSIONS: &[(&str, &str)] = &[
    ("Microsoft.Network/publicIPAddresses", "2023-09-01"),
    ("Microsoft.Network/virtualNetworks", "2023-09-01"),
    ("Microsoft.Storage/storageAccounts", "2023-01-01"),
    ("Microsoft.Compute/disks", "2023-04-02"),
    ("Microsoft.Sql/servers", "2021-11-01"),
    ("Microsoft.Web/sites", "2022-03-01"),
    ("Microsoft.KeyVault/vaults", "2023-07-01"),
    ("Microsoft.Synapse/workspaces", "2021-06-01"),
    ("Microsoft.DocumentDB/databaseAccounts", "2023-04-15"),
    ("Microsoft.AppConfiguration/configurationStores", "2023-03-01"),
    ("Microsoft.ContainerRegistry/registries", "2023-07-01"),
    ("Microsoft.OperationalInsights/workspaces", "2022-10-01"),
    ("Microsoft.MachineLearningServices/workspaces", "2023-04-01"),
    ("Microsoft.CognitiveServices/accounts", "2023-05-01"),
    ("Microsoft.DBforPostgreSQL/servers", "2017-12-01"),
    ("Microsoft.DBforMySQL/servers", "2017-12-01"),
    ("Microsoft.DBforMariaDB/servers", "2018-06-01"),
    ("Microsoft.DataLakeStore/accounts", "2016-11-01"),
];

/// Provider api-version for a resource type, if the inventory knows it
pub fn api_version(resource_type: &str) -> Option<&'static str> {
    API_VERSIONS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(resource_type))
        .map(|(_, v)| *v)
}

/// `Namespace/type` of the top-level resource an id points into
pub fn provider_type(id: &str) -> Option<String> {
    let mut segments = id.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("providers") {
            let namespace = segments.next()?;
            let kind = segments.next()?;
            return Some(format!("{}/{}", namespace, kind));
        }
    }
    None
}

fn child_api_version(parent_id: &str, child_path: &str) -> ProviderResult<&'static str> {
    if child_path.eq_ignore_ascii_case(paths::DIAGNOSTIC_SETTINGS) {
        return Ok(DIAGNOSTIC_SETTINGS_API_VERSION);
    }
    provider_type(parent_id)
        .as_deref()
        .and_then(api_version)
        .ok_or_else(|| ProviderError::Unsupported(format!("{}/{}", parent_id, child_path)))
}

fn to_resource(value: Value) -> ProviderResult<Resource> {
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    display_name: Option<String>,
}

/// Inventory of one subscription
#[derive(Debug, Clone)]
pub struct AzureInventory {
    arm: ArmClient,
    subscription_id: String,
}

impl AzureInventory {
    /// Inventory of one subscription
    pub fn new(arm: ArmClient, subscription_id: impl Into<String>) -> Self {
        Self {
            arm,
            subscription_id: subscription_id.into(),
        }
    }

    fn child_path(parent_id: &str, child_path: &str) -> String {
        format!(
            "{}/{}",
            parent_id.trim_end_matches('/'),
            child_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl InventoryProvider for AzureInventory {
    fn list_resources<'a>(&'a self, type_filter: Option<&'a str>) -> ResourceStream<'a> {
        let path = format!("/subscriptions/{}/resources", self.subscription_id);
        let filter = type_filter.map(|t| format!("resourceType eq '{}'", t));

        let mut query = vec![("api-version", RESOURCES_API_VERSION)];
        if let Some(filter) = filter.as_deref() {
            query.push(("$filter", filter));
        }

        match self.arm.url(&path, &query) {
            Ok(url) => self
                .arm
                .list(url)
                .map(|item| item.map_err(ProviderError::from).and_then(to_resource))
                .boxed(),
            Err(e) => stream::once(async move { Err(ProviderError::from(e)) }).boxed(),
        }
    }

    async fn get_properties(
        &self,
        resource_type: &str,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Resource> {
        let version = api_version(resource_type)
            .ok_or_else(|| ProviderError::Unsupported(resource_type.to_string()))?;
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id, resource_group, resource_type, name
        );
        let value: Value = self.arm.get(&path, version).await?;
        to_resource(value)
    }

    async fn list_children(&self, parent_id: &str, child_path: &str) -> ProviderResult<Vec<Resource>> {
        let version = child_api_version(parent_id, child_path)?;
        self.arm
            .list_all(&Self::child_path(parent_id, child_path), version)
            .await?
            .into_iter()
            .map(to_resource)
            .collect()
    }

    async fn get_child(&self, parent_id: &str, child_path: &str) -> ProviderResult<Resource> {
        let version = child_api_version(parent_id, child_path)?;
        let value: Value = self
            .arm
            .get(&Self::child_path(parent_id, child_path), version)
            .await?;
        to_resource(value)
    }

    async fn subscription_display_name(&self) -> ProviderResult<Option<String>> {
        let path = format!("/subscriptions/{}", self.subscription_id);
        let subscription: Subscription = self
            .arm
            .get(&path, SUBSCRIPTION_API_VERSION)
            .await?;
        Ok(subscription.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use reqwest::Client;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zt_core::StaticToken;

    const ACCOUNT: &str =
        "/subscriptions/0000/resourceGroups/rg-data/providers/Microsoft.Storage/storageAccounts/st1";

    fn inventory(server: &MockServer) -> AzureInventory {
        let arm = ArmClient::new(Client::new(), &server.uri(), Arc::new(StaticToken::new("tok")));
        AzureInventory::new(arm, "0000")
    }

    #[test]
    fn test_provider_type() {
        assert_eq!(provider_type(ACCOUNT).as_deref(), Some("Microsoft.Storage/storageAccounts"));
        assert_eq!(
            provider_type(&format!("{}/blobServices/default", ACCOUNT)).as_deref(),
            Some("Microsoft.Storage/storageAccounts")
        );
        assert_eq!(provider_type("/subscriptions/0000"), None);
        assert_eq!(api_version("microsoft.compute/disks"), Some("2023-04-02"));
    }

    #[tokio::test]
    async fn test_list_resources_filters_by_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/0000/resources"))
            .and(query_param("$filter", "resourceType eq 'Microsoft.Compute/disks'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.Compute/disks/d1",
                    "name": "d1",
                    "type": "Microsoft.Compute/disks",
                    "location": "westeurope"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let inv = inventory(&server);
        let disks: Vec<_> = inv
            .list_resources(Some("Microsoft.Compute/disks"))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].name, "d1");
        assert_eq!(disks[0].resource_group(), Some("rg"));
    }

    #[tokio::test]
    async fn test_public_ip_control_reads_full_definition() {
        use zt_core::controls::PublicIpAddresses;
        use zt_core::{ClientCredentials, Control, ControlStatus, ScanContext};

        const PIP: &str =
            "/subscriptions/0000/resourceGroups/rg-net/providers/Microsoft.Network/publicIPAddresses/pip1";
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/0000/resources"))
            .and(query_param("$filter", "resourceType eq 'Microsoft.Network/publicIPAddresses'"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "id": PIP, "name": "pip1", "type": "Microsoft.Network/publicIPAddresses" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PIP))
            .and(query_param("api-version", "2023-09-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PIP,
                "name": "pip1",
                "type": "Microsoft.Network/publicIPAddresses",
                "properties": { "ipAddress": "20.1.2.3" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ScanContext::new("0000", "prod", ClientCredentials::default());
        let result = PublicIpAddresses.evaluate(&ctx, &inventory(&server)).await.unwrap();

        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.violating_resources[0].reason, "Public IP address 20.1.2.3 is allocated");
    }

    #[tokio::test]
    async fn test_children_and_child() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/blobServices/default/containers", ACCOUNT)))
            .and(query_param("api-version", "2023-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "id": format!("{}/blobServices/default/containers/web", ACCOUNT),
                    "name": "web",
                    "type": "Microsoft.Storage/storageAccounts/blobServices/containers",
                    "properties": { "publicAccess": "Blob" }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/blobServices/default/providers/Microsoft.Insights/diagnosticSettings", ACCOUNT)))
            .and(query_param("api-version", DIAGNOSTIC_SETTINGS_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .mount(&server)
            .await;

        let inv = inventory(&server);
        let containers = inv.list_children(ACCOUNT, paths::BLOB_CONTAINERS).await.unwrap();
        assert_eq!(containers[0].properties["publicAccess"], "Blob");

        let blob = format!("{}/blobServices/default", ACCOUNT);
        assert!(inv.list_children(&blob, paths::DIAGNOSTIC_SETTINGS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_type() {
        let server = MockServer::start().await;
        let err = inventory(&server)
            .get_properties("Microsoft.Foo/bars", "rg", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_subscription_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/0000"))
            .and(query_param("api-version", SUBSCRIPTION_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "subscriptionId": "0000",
                "displayName": "Contoso Prod"
            })))
            .mount(&server)
            .await;

        let name = inventory(&server).subscription_display_name().await.unwrap();
        assert_eq!(name.as_deref(), Some("Contoso Prod"));
    }
}

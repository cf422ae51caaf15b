//! Resource Inventory Provider
//!
//! Controls never talk to a cloud API directly. They enumerate and read
//! resources through [`InventoryProvider`], which the Azure crate
//! implements over ARM and [`InMemoryInventory`] implements for tests and
//! offline runs.

use crate::error::{ControlError, ProviderError, ProviderResult};
use crate::model::ScanContext;
use crate::resource_id;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Lazily produced sequence of resources. Each pull may suspend on I/O.
pub type ResourceStream<'a> = BoxStream<'a, ProviderResult<Resource>>;

/// Child paths shared by the controls and the providers
pub mod paths {
    /// Diagnostic settings extension
    pub const DIAGNOSTIC_SETTINGS: &str = "providers/Microsoft.Insights/diagnosticSettings";
    /// Private endpoint connections of a PaaS resource
    pub const PRIVATE_ENDPOINT_CONNECTIONS: &str = "privateEndpointConnections";
    /// App Service site configuration
    pub const WEB_CONFIG: &str = "config/web";
    /// Blob containers of a storage account
    pub const BLOB_CONTAINERS: &str = "blobServices/default/containers";
    /// Auditing policy of a SQL server or database
    pub const SQL_AUDITING: &str = "auditingSettings/default";
    /// Peerings of a virtual network
    pub const VNET_PEERINGS: &str = "virtualNetworkPeerings";
    /// Subnets of a virtual network
    pub const SUBNETS: &str = "subnets";

    /// Storage sub-services that carry their own diagnostic settings
    pub const STORAGE_SERVICES: [&str; 4] = [
        "blobServices/default",
        "fileServices/default",
        "queueServices/default",
        "tableServices/default",
    ];
}

/// One resource, ARM-shaped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Full ARM id
    pub id: String,
    /// Last segment of the id
    #[serde(default)]
    pub name: String,
    /// ARM type
    #[serde(rename = "type", default)]
    pub resource_type: String,
    /// Azure region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// `properties` object; `Null` when the provider did not return it
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Resource {
    /// Build a resource whose name is the last segment of `id`
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let id = id.into();
        let name = resource_id::resource_name(&id).unwrap_or_default().to_string();
        Self {
            id,
            name,
            resource_type: resource_type.into(),
            location: None,
            properties: serde_json::Value::Null,
        }
    }

    /// Set the region
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the properties object
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    /// Resource group parsed from the id
    pub fn resource_group(&self) -> Option<&str> {
        resource_id::resource_group(&self.id)
    }

    /// Case-insensitive type match
    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type.eq_ignore_ascii_case(resource_type)
    }

    /// Decode `properties` into a typed view. Absent properties decode as `{}`.
    pub fn properties_as<T: DeserializeOwned>(&self) -> Result<T, ControlError> {
        let value = match &self.properties {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| ControlError::Malformed {
            resource_type: self.resource_type.clone(),
            name: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// Capability the controls enumerate and read resources through
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// All resources of the subscription, optionally only one type
    fn list_resources<'a>(&'a self, type_filter: Option<&'a str>) -> ResourceStream<'a>;

    /// Full definition of one resource
    async fn get_properties(
        &self,
        resource_type: &str,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Resource>;

    /// Child collection below a resource, e.g. `subnets`
    async fn list_children(&self, parent_id: &str, child_path: &str) -> ProviderResult<Vec<Resource>>;

    /// Single child below a resource, e.g. `config/web`
    async fn get_child(&self, parent_id: &str, child_path: &str) -> ProviderResult<Resource>;

    /// Human-readable subscription name, when the provider knows it
    async fn subscription_display_name(&self) -> ProviderResult<Option<String>> {
        Ok(None)
    }
}

/// Builds an inventory provider for one scan
#[async_trait]
pub trait InventoryConnector: Send + Sync {
    /// Authenticate and return the inventory of `ctx.subscription_id`
    async fn connect(&self, ctx: &ScanContext) -> ProviderResult<Arc<dyn InventoryProvider>>;
}

// =============================================================================
// In-memory inventory
// =============================================================================

/// Listing key matching unfiltered enumeration
pub const ALL_TYPES: &str = "*";

/// In-memory inventory (for testing and offline runs)
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    resources: Vec<Resource>,
    children: HashMap<(String, String), Vec<Resource>>,
    listing_failures: HashMap<String, ProviderError>,
    resource_failures: HashMap<String, ProviderError>,
    child_failures: HashMap<(String, String), ProviderError>,
    latency: HashMap<String, Duration>,
    subscription_name: Option<String>,
    bare_listings: bool,
}

fn key(s: &str) -> String {
    s.trim_end_matches('/').to_ascii_lowercase()
}

impl InMemoryInventory {
    /// Empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level resource
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Register one child under `parent_id`/`child_path`
    pub fn with_child(mut self, parent_id: &str, child_path: &str, child: Resource) -> Self {
        self.children
            .entry((key(parent_id), key(child_path)))
            .or_default()
            .push(child);
        self
    }

    /// Register an existing but empty child collection
    pub fn with_children(mut self, parent_id: &str, child_path: &str, children: Vec<Resource>) -> Self {
        self.children
            .entry((key(parent_id), key(child_path)))
            .or_default()
            .extend(children);
        self
    }

    /// Make enumeration of `resource_type` (or [`ALL_TYPES`]) fail
    pub fn fail_listing(mut self, resource_type: &str, err: ProviderError) -> Self {
        self.listing_failures.insert(key(resource_type), err);
        self
    }

    /// Make every read of one resource (and its children) fail
    pub fn fail_resource(mut self, resource_id: &str, err: ProviderError) -> Self {
        self.resource_failures.insert(key(resource_id), err);
        self
    }

    /// Make one child read fail with `err`
    pub fn fail_child(mut self, parent_id: &str, child_path: &str, err: ProviderError) -> Self {
        self.child_failures.insert((key(parent_id), key(child_path)), err);
        self
    }

    /// Delay enumeration of `resource_type` (or [`ALL_TYPES`])
    pub fn with_latency(mut self, resource_type: &str, delay: Duration) -> Self {
        self.latency.insert(key(resource_type), delay);
        self
    }

    /// List resources the way ARM's generic listing does: no `properties`,
    /// so only `get_properties` sees the full definition
    pub fn with_bare_listings(mut self) -> Self {
        self.bare_listings = true;
        self
    }

    /// Display name returned by `subscription_name`
    pub fn with_subscription_name(mut self, name: impl Into<String>) -> Self {
        self.subscription_name = Some(name.into());
        self
    }

    fn child_failure(&self, parent_id: &str, child_path: &str) -> Option<ProviderError> {
        self.resource_failures
            .get(&key(parent_id))
            .or_else(|| self.child_failures.get(&(key(parent_id), key(child_path))))
            .cloned()
    }
}

#[async_trait]
impl InventoryProvider for InMemoryInventory {
    fn list_resources<'a>(&'a self, type_filter: Option<&'a str>) -> ResourceStream<'a> {
        let listing_key = key(type_filter.unwrap_or(ALL_TYPES));
        let delay = self.latency.get(&listing_key).copied();
        let bare = self.bare_listings;

        let items: Vec<ProviderResult<Resource>> = match self.listing_failures.get(&listing_key) {
            Some(err) => vec![Err(err.clone())],
            None => self
                .resources
                .iter()
                .filter(|r| type_filter.map_or(true, |t| r.is_type(t)))
                .map(|r| {
                    let mut listed = r.clone();
                    if bare {
                        listed.properties = serde_json::Value::Null;
                    }
                    Ok(listed)
                })
                .collect(),
        };

        stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }

    async fn get_properties(
        &self,
        resource_type: &str,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<Resource> {
        let found = self
            .resources
            .iter()
            .find(|r| {
                r.is_type(resource_type)
                    && r.name.eq_ignore_ascii_case(name)
                    && r.resource_group()
                        .map_or(false, |rg| rg.eq_ignore_ascii_case(resource_group))
            })
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}/{}", resource_type, resource_group, name)))?;

        if let Some(err) = self.resource_failures.get(&key(&found.id)) {
            return Err(err.clone());
        }
        Ok(found.clone())
    }

    async fn list_children(&self, parent_id: &str, child_path: &str) -> ProviderResult<Vec<Resource>> {
        if let Some(err) = self.child_failure(parent_id, child_path) {
            return Err(err);
        }
        Ok(self
            .children
            .get(&(key(parent_id), key(child_path)))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_child(&self, parent_id: &str, child_path: &str) -> ProviderResult<Resource> {
        if let Some(err) = self.child_failure(parent_id, child_path) {
            return Err(err);
        }
        self.children
            .get(&(key(parent_id), key(child_path)))
            .and_then(|c| c.first())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("{}/{}", parent_id, child_path)))
    }

    async fn subscription_display_name(&self) -> ProviderResult<Option<String>> {
        Ok(self.subscription_name.clone())
    }
}

/// Connector handing out a shared in-memory inventory
#[derive(Debug, Clone)]
pub struct StaticConnector {
    inventory: Arc<InMemoryInventory>,
}

impl StaticConnector {
    /// Connector handing out `inventory` on every connect
    pub fn new(inventory: InMemoryInventory) -> Self {
        Self {
            inventory: Arc::new(inventory),
        }
    }
}

#[async_trait]
impl InventoryConnector for StaticConnector {
    async fn connect(&self, _ctx: &ScanContext) -> ProviderResult<Arc<dyn InventoryProvider>> {
        Ok(self.inventory.clone())
    }
}

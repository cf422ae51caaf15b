//! PaaS private access
//!
//! Every PaaS kind must have public network access disabled and at least
//! one private endpoint. Log Analytics workspaces are judged on their
//! network perimeter settings instead. Each kind is scanned on its own so
//! an unreachable API for one kind leaves the others intact.

use crate::control::{fetch, violation_as, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::warn;

const UNKNOWN: &str = "Unknown";
const DISABLED: &str = "Disabled";
const SECURED_BY_PERIMETER: &str = "SecuredByPerimeter";

/// Where a kind keeps its access flag and private endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// Access in `config/web`, endpoints as a child list
    WebApp,
    /// Access inline, endpoints as a child list
    ChildEndpoints,
    /// Access and endpoints inline
    Inline,
    /// Ingestion and query perimeter flags
    Perimeter,
}

#[derive(Debug, Clone, Copy)]
struct PaasKind {
    label: &'static str,
    resource_type: &'static str,
    lookup: Lookup,
}

const KINDS: [PaasKind; 9] = [
    PaasKind { label: "Web App", resource_type: "Microsoft.Web/sites", lookup: Lookup::WebApp },
    PaasKind { label: "Storage Account", resource_type: super::STORAGE_ACCOUNTS, lookup: Lookup::Inline },
    PaasKind { label: "SQL Server", resource_type: super::SQL_SERVERS, lookup: Lookup::ChildEndpoints },
    PaasKind { label: "Key Vault", resource_type: "Microsoft.KeyVault/vaults", lookup: Lookup::Inline },
    PaasKind { label: "Synapse Workspace", resource_type: "Microsoft.Synapse/workspaces", lookup: Lookup::Inline },
    PaasKind { label: "Cosmos DB", resource_type: "Microsoft.DocumentDB/databaseAccounts", lookup: Lookup::Inline },
    PaasKind { label: "App Config", resource_type: "Microsoft.AppConfiguration/configurationStores", lookup: Lookup::Inline },
    PaasKind { label: "ACR", resource_type: "Microsoft.ContainerRegistry/registries", lookup: Lookup::Inline },
    PaasKind {
        label: "Log Analytics Workspace",
        resource_type: "Microsoft.OperationalInsights/workspaces",
        lookup: Lookup::Perimeter,
    },
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NetworkProperties {
    public_network_access: Option<String>,
    private_endpoint_connections: Vec<serde_json::Value>,
    public_network_access_for_ingestion: Option<String>,
    public_network_access_for_query: Option<String>,
}

/// Exposed when public access is not disabled or no private endpoint exists
pub fn is_exposed(access: &str, private_endpoints: usize) -> bool {
    access != DISABLED || private_endpoints == 0
}

/// PaaS services reachable only through private endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct PaasPrivateAccess;

impl PaasPrivateAccess {
    async fn scan_kind(
        &self,
        kind: &PaasKind,
        inventory: &dyn InventoryProvider,
        findings: &mut Findings,
    ) -> Result<(), ControlError> {
        let mut listed = inventory.list_resources(Some(kind.resource_type));
        while let Some(resource) = listed.try_next().await? {
            if kind.lookup == Lookup::Perimeter && resource.resource_group().is_none() {
                continue;
            }
            let outcome = self.inspect(kind, &resource, inventory).await;
            findings.settle_as(&resource, kind.label, outcome);
        }
        Ok(())
    }

    async fn inspect(
        &self,
        kind: &PaasKind,
        resource: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        if kind.lookup == Lookup::Perimeter {
            return self.inspect_perimeter(kind, resource, inventory).await;
        }

        let (access, endpoints) = match kind.lookup {
            Lookup::WebApp => {
                let config = inventory.get_child(&resource.id, paths::WEB_CONFIG).await?;
                let props: NetworkProperties = config.properties_as()?;
                let endpoints = match inventory
                    .list_children(&resource.id, paths::PRIVATE_ENDPOINT_CONNECTIONS)
                    .await
                {
                    Ok(connections) => connections.len(),
                    Err(e) => {
                        warn!("Private endpoint lookup failed for app {}: {}", resource.name, e);
                        0
                    }
                };
                (props.public_network_access, endpoints)
            }
            Lookup::ChildEndpoints => {
                let full = fetch(inventory, resource).await?;
                let props: NetworkProperties = full.properties_as()?;
                let endpoints = inventory
                    .list_children(&resource.id, paths::PRIVATE_ENDPOINT_CONNECTIONS)
                    .await?
                    .len();
                (props.public_network_access, endpoints)
            }
            _ => {
                let full = fetch(inventory, resource).await?;
                let props: NetworkProperties = full.properties_as()?;
                (props.public_network_access, props.private_endpoint_connections.len())
            }
        };

        let access = access.unwrap_or_else(|| UNKNOWN.to_string());
        let mut eval = Evaluation::new()
            .attribute("publicNetworkAccess", access.clone())
            .attribute("privateEndpoints", endpoints.to_string());
        if is_exposed(&access, endpoints) {
            eval.violate(violation_as(
                resource,
                kind.label,
                format!("Public access: {}, Private Endpoints: {}", access, endpoints),
            ));
        }
        Ok(eval)
    }

    async fn inspect_perimeter(
        &self,
        kind: &PaasKind,
        resource: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let full = fetch(inventory, resource).await?;
        let props: NetworkProperties = full.properties_as()?;
        let ingestion = props
            .public_network_access_for_ingestion
            .unwrap_or_else(|| UNKNOWN.to_string());
        let query = props
            .public_network_access_for_query
            .unwrap_or_else(|| UNKNOWN.to_string());

        let mut eval = Evaluation::new()
            .attribute("ingestion", ingestion.clone())
            .attribute("query", query.clone());
        if ingestion != SECURED_BY_PERIMETER || query != SECURED_BY_PERIMETER {
            eval.violate(violation_as(
                resource,
                kind.label,
                format!("Ingestion: {}, Query: {}", ingestion, query),
            ));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for PaasPrivateAccess {
    fn id(&self) -> ControlId {
        ControlId::PaasPrivateAccess
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "All PaaS services must have Private Endpoint & Public Access disabled".into()
    }

    fn description(&self) -> &'static str {
        "PaaS services are reachable only through private endpoints"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        for kind in &KINDS {
            if let Err(e) = self.scan_kind(kind, inventory, &mut findings).await {
                findings.kind_error(kind.label, &e);
            }
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All PaaS services comply with Zero Trust rules.",
            |n| format!("{} PaaS resource(s) violate Zero Trust policies.", n),
        ))
    }
}

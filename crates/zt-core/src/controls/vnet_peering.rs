//! VNet peering topology

use super::VIRTUAL_NETWORKS;
use crate::config::EngineConfig;
use crate::control::{violation_as, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use crate::resource_id::same_resource;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PeeringProperties {
    remote_virtual_network: Option<SubResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubResource {
    id: Option<String>,
}

/// VNet peerings only to expected networks
#[derive(Debug, Clone, Default)]
pub struct VnetPeering {
    expected: HashMap<String, Vec<String>>,
}

impl VnetPeering {
    /// Control for the environments in `config`
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            expected: config.expected_peers.clone(),
        }
    }

    async fn inspect(
        &self,
        vnet: &Resource,
        expected: &[String],
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let mut peered = Vec::new();
        for peering in inventory.list_children(&vnet.id, paths::VNET_PEERINGS).await? {
            let props: PeeringProperties = peering.properties_as()?;
            if let Some(id) = props.remote_virtual_network.and_then(|r| r.id) {
                peered.push(id);
            }
        }

        // A hub is not expected to peer with itself
        let missing: Vec<&str> = expected
            .iter()
            .filter(|want| !same_resource(want, &vnet.id))
            .filter(|want| !peered.iter().any(|have| same_resource(have, want)))
            .map(String::as_str)
            .collect();

        let mut eval = Evaluation::new().attribute("peeredWith", peered.join(", "));
        if !missing.is_empty() {
            eval.violate(violation_as(
                vnet,
                "VNet",
                format!("Missing peering with: {}", missing.join(", ")),
            ));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for VnetPeering {
    fn id(&self) -> ControlId {
        ControlId::VnetPeering
    }

    fn policy(&self, ctx: &ScanContext) -> String {
        format!("All VNets must be peered with required remote VNets [{}]", ctx.environment)
    }

    fn description(&self) -> &'static str {
        "Every virtual network is peered with the environment's required remote networks"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let expected = self
            .expected
            .get(&ctx.environment_key())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut findings = Findings::new();
        let mut vnets = inventory.list_resources(Some(VIRTUAL_NETWORKS));
        while let Some(vnet) = vnets.try_next().await? {
            let outcome = self.inspect(&vnet, expected, inventory).await;
            findings.settle_as(&vnet, "VNet", outcome);
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All VNets are correctly peered.",
            |n| format!("{} VNet(s) are missing required peering.", n),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::{ctx, id, resource};
    use crate::error::ProviderError;
    use crate::inventory::InMemoryInventory;
    use crate::model::{ControlStatus, Remark};
    use serde_json::json;

    fn hub() -> String {
        id("rg-hub", VIRTUAL_NETWORKS, "hub")
    }

    fn peering(vnet: &Resource, remote: &str) -> Resource {
        Resource::new(
            format!("{}/virtualNetworkPeerings/to-remote", vnet.id),
            "Microsoft.Network/virtualNetworks/virtualNetworkPeerings",
        )
        .with_properties(json!({ "remoteVirtualNetwork": { "id": remote } }))
    }

    fn control() -> VnetPeering {
        VnetPeering::new(&EngineConfig::default().with_expected_peers("prod", [hub()]))
    }

    #[tokio::test]
    async fn test_missing_peering() {
        let spoke1 = resource("rg-a", VIRTUAL_NETWORKS, "spoke1");
        let spoke2 = resource("rg-b", VIRTUAL_NETWORKS, "spoke2");
        let inv = InMemoryInventory::new().with_bare_listings()
            .with_child(&spoke1.id, paths::VNET_PEERINGS, peering(&spoke1, &hub().to_lowercase()))
            .with_resource(spoke1)
            .with_resource(spoke2);

        let result = control().evaluate(&ctx(), &inv).await.unwrap();

        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.policy, "All VNets must be peered with required remote VNets [prod]");
        assert_eq!(result.reason, "1 VNet(s) are missing required peering.");
        assert_eq!(result.scanned_resources[0].remark, Remark::Comply);

        let v = &result.violating_resources[0];
        assert_eq!(v.resource_type, "VNet");
        assert_eq!(v.name, "spoke2");
        assert_eq!(v.resource_group.as_deref(), Some("rg-b"));
        assert_eq!(v.reason, format!("Missing peering with: {}", hub()));
    }

    #[tokio::test]
    async fn test_hub_not_required_to_peer_with_itself() {
        let inv = InMemoryInventory::new().with_bare_listings().with_resource(Resource::new(hub(), VIRTUAL_NETWORKS));
        let result = control().evaluate(&ctx(), &inv).await.unwrap();
        assert_eq!(result.status, ControlStatus::Pass);
    }

    #[tokio::test]
    async fn test_peering_lookup_failure() {
        let spoke = resource("rg-a", VIRTUAL_NETWORKS, "spoke1");
        let inv = InMemoryInventory::new().with_bare_listings()
            .fail_child(&spoke.id, paths::VNET_PEERINGS, ProviderError::Http("503".into()))
            .with_resource(spoke);

        let result = control().evaluate(&ctx(), &inv).await.unwrap();
        assert_eq!(result.scanned_resources[0].remark, Remark::Error);
        assert_eq!(result.violating_resources[0].resource_type, "VNet");
    }
}

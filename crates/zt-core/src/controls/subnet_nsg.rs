//! Subnet to NSG association

use super::VIRTUAL_NETWORKS;
use crate::control::{violation_as, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubnetProperties {
    network_security_group: Option<SubResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubResource {
    id: Option<String>,
}

/// Every subnet has a network security group
#[derive(Debug, Clone, Copy, Default)]
pub struct SubnetNsg;

impl SubnetNsg {
    fn inspect(&self, vnet: &Resource, subnet: &Resource) -> Result<Evaluation, ControlError> {
        let props: SubnetProperties = subnet.properties_as()?;
        let nsg = props
            .network_security_group
            .and_then(|n| n.id)
            .filter(|id| !id.trim().is_empty());

        let mut eval = Evaluation::new()
            .attribute("vnet", vnet.name.clone())
            .attribute("nsg", nsg.clone().unwrap_or_else(|| "None".into()));
        if nsg.is_none() {
            eval.violate(
                violation_as(subnet, "Subnet", "No NSG associated").with_attribute("vnet", vnet.name.clone()),
            );
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for SubnetNsg {
    fn id(&self) -> ControlId {
        ControlId::SubnetNsg
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "All Subnets must have NSG associated".into()
    }

    fn description(&self) -> &'static str {
        "Every subnet filters traffic through a network security group"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut vnets = inventory.list_resources(Some(VIRTUAL_NETWORKS));
        while let Some(vnet) = vnets.try_next().await? {
            match inventory.list_children(&vnet.id, paths::SUBNETS).await {
                Ok(subnets) => {
                    for subnet in &subnets {
                        let outcome = self.inspect(&vnet, subnet);
                        findings.settle_as(subnet, "Subnet", outcome);
                    }
                }
                Err(e) => findings.resource_error(&vnet, "Subnet", &e),
            }
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All subnets are correctly associated with NSGs.",
            |n| format!("{} subnet(s) are missing NSG association.", n),
        ))
    }
}

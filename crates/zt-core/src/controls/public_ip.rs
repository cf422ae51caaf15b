//! No allocated public IP addresses

use crate::control::{fetch, violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;

const PUBLIC_IP_ADDRESSES: &str = "Microsoft.Network/publicIPAddresses";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PublicIpProperties {
    ip_address: Option<String>,
}

/// Public IP addresses must not be allocated
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicIpAddresses;

impl PublicIpAddresses {
    async fn inspect(
        &self,
        listed: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let resource = &fetch(inventory, listed).await?;
        let props: PublicIpProperties = resource.properties_as()?;
        let mut eval = Evaluation::new();

        if let Some(ip) = props.ip_address.filter(|ip| !ip.trim().is_empty()) {
            eval.violate(
                violation(resource, format!("Public IP address {} is allocated", ip))
                    .with_attribute("ipAddress", ip.clone()),
            );
            eval = eval.attribute("ipAddress", ip);
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for PublicIpAddresses {
    fn id(&self) -> ControlId {
        ControlId::PublicIp
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Ensure no Public IP exists".into()
    }

    fn description(&self) -> &'static str {
        "Public IP addresses expose workloads directly to the internet"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut ips = inventory.list_resources(Some(PUBLIC_IP_ADDRESSES));
        while let Some(ip) = ips.try_next().await? {
            let outcome = self.inspect(&ip, inventory).await;
            findings.settle(&ip, outcome);
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "No public IP addresses found in the subscription.",
            |n| format!("{} public IP(s) detected.", n),
        ))
    }
}

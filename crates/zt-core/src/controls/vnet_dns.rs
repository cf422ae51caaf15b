//! Virtual network DNS servers

use super::VIRTUAL_NETWORKS;
use crate::config::EngineConfig;
use crate::control::{fetch, violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, Remark, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VnetProperties {
    dhcp_options: DhcpOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DhcpOptions {
    dns_servers: Vec<String>,
}

/// Expected servers not present in `actual`, in expected order
pub fn missing_servers<'a>(expected: &'a [String], actual: &[String]) -> Vec<&'a str> {
    expected
        .iter()
        .filter(|ip| !actual.iter().any(|a| a.trim() == ip.as_str()))
        .map(String::as_str)
        .collect()
}

/// VNet DNS servers match the environment's expected set
#[derive(Debug, Clone, Default)]
pub struct VnetDns {
    expected: HashMap<String, Vec<String>>,
}

impl VnetDns {
    /// Control for the environments in `config`
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            expected: config.expected_dns.clone(),
        }
    }

    fn expected_for(&self, ctx: &ScanContext) -> &[String] {
        self.expected
            .get(&ctx.environment_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    async fn inspect(
        &self,
        listed: &Resource,
        expected: &[String],
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let vnet = fetch(inventory, listed).await?;
        let actual = vnet.properties_as::<VnetProperties>()?.dhcp_options.dns_servers;
        let missing = missing_servers(expected, &actual).join(", ");
        let location = vnet.location.clone().unwrap_or_default();

        let mut eval = Evaluation::new()
            .attribute("location", location.clone())
            .attribute("dnsServers", actual.join(", "));
        if !missing.is_empty() {
            eval.violate(
                violation(listed, format!("Missing expected DNS IP(s): {}", missing))
                    .with_attribute("location", location),
            );
            eval = eval.with_remark(Remark::not_comply_with(format!("Missing DNS IPs: {}", missing)));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for VnetDns {
    fn id(&self) -> ControlId {
        ControlId::VnetDns
    }

    fn policy(&self, ctx: &ScanContext) -> String {
        format!("Ensure VNETs use correct DNS IPs [{}]", ctx.environment)
    }

    fn description(&self) -> &'static str {
        "Virtual networks resolve through the environment's sanctioned DNS servers"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        if ctx.environment.trim().is_empty() {
            return Err(ControlError::Config(
                "Environment is required to determine DNS IPs".into(),
            ));
        }
        let expected = self.expected_for(ctx);
        if expected.is_empty() {
            warn!("No expected DNS servers configured for environment {}", ctx.environment);
        }

        let mut findings = Findings::new();
        let mut vnets = inventory.list_resources(Some(VIRTUAL_NETWORKS));
        while let Some(vnet) = vnets.try_next().await? {
            let outcome = self.inspect(&vnet, expected, inventory).await;
            findings.settle(&vnet, outcome);
        }

        let configured = expected.join(", ");
        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            format!("All VNETs use configured DNS IPs ({})", configured),
            |n| format!("{} VNET(s) missing expected DNS IPs", n),
        ))
    }
}

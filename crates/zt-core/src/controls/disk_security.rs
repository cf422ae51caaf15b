//! Managed disk exposure and encryption at rest

use super::DISKS;
use crate::control::{fetch, violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;

/// Encryption types that satisfy the at-rest rule
pub const ACCEPTED_ENCRYPTION: [&str; 3] = [
    "EncryptionAtRestWithPlatformKey",
    "EncryptionAtRestWithCustomerKey",
    "EncryptionAtRestWithPlatformAndCustomerKeys",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DiskProperties {
    public_network_access: Option<String>,
    encryption: Option<DiskEncryption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiskEncryption {
    #[serde(rename = "type")]
    encryption_type: Option<String>,
}

/// Managed disks: no public network access, encrypted at rest
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSecurity;

impl DiskSecurity {
    async fn inspect(
        &self,
        listed: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let disk = fetch(inventory, listed).await?;
        let props: DiskProperties = disk.properties_as()?;

        // Disks are private unless stated otherwise
        let public_access = props
            .public_network_access
            .unwrap_or_else(|| "Disabled".to_string());
        let encryption = props.encryption.and_then(|e| e.encryption_type);
        let encrypted = encryption
            .as_deref()
            .map_or(false, |t| ACCEPTED_ENCRYPTION.contains(&t));

        let mut eval = Evaluation::new()
            .attribute("publicNetworkAccess", public_access.clone())
            .attribute("encryptionType", encryption.unwrap_or_else(|| "None".to_string()));

        if public_access != "Disabled" {
            eval.violate(violation(listed, "Public network access is not disabled"));
        }
        if !encrypted {
            eval.violate(violation(
                listed,
                "Encryption at rest with a platform or customer key is not enabled",
            ));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for DiskSecurity {
    fn id(&self) -> ControlId {
        ControlId::DiskSecurity
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Disk Security (No public access, encryption at rest enabled)".into()
    }

    fn description(&self) -> &'static str {
        "Managed disks are not publicly reachable and are encrypted at rest"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut disks = inventory.list_resources(Some(DISKS));
        while let Some(disk) = disks.try_next().await? {
            let outcome = self.inspect(&disk, inventory).await;
            findings.settle(&disk, outcome);
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All disks comply with security requirements",
            |n| format!("{} violation(s) found", n),
        ))
    }
}

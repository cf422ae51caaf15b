//! Storage account hardening: no shared-key access, no public containers

use super::STORAGE_ACCOUNTS;
use crate::control::{fetch, violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AccountProperties {
    /// Shared keys are allowed unless explicitly disabled
    allow_shared_key_access: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContainerProperties {
    public_access: Option<String>,
}

/// Storage accounts: no shared-key access, no public containers
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageAccountSecurity;

impl StorageAccountSecurity {
    async fn inspect(
        &self,
        listed: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let account = fetch(inventory, listed).await?;
        let props: AccountProperties = account.properties_as()?;
        let shared_key = props.allow_shared_key_access != Some(false);

        let mut public_containers = Vec::new();
        for container in inventory.list_children(&listed.id, paths::BLOB_CONTAINERS).await? {
            let access = container.properties_as::<ContainerProperties>()?.public_access;
            if access.map_or(false, |a| !a.is_empty() && a != "None") {
                public_containers.push(container.name);
            }
        }

        let mut eval = Evaluation::new()
            .attribute("allowSharedKeyAccess", if shared_key { "Enabled" } else { "Disabled" })
            .attribute(
                "publicContainers",
                if public_containers.is_empty() {
                    "None".to_string()
                } else {
                    public_containers.join(", ")
                },
            );

        if shared_key {
            eval.violate(violation(
                listed,
                "Access key-based access (allowSharedKeyAccess) is enabled",
            ));
        }
        if !public_containers.is_empty() {
            eval.violate(violation(
                listed,
                format!("Public blob containers: {}", public_containers.join(", ")),
            ));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for StorageAccountSecurity {
    fn id(&self) -> ControlId {
        ControlId::StorageSecurity
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Storage Account Security (No public blobs, no access key-based access)".into()
    }

    fn description(&self) -> &'static str {
        "Storage accounts reject shared-key auth and expose no anonymous containers"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut accounts = inventory.list_resources(Some(STORAGE_ACCOUNTS));
        while let Some(account) = accounts.try_next().await? {
            let outcome = self.inspect(&account, inventory).await;
            findings.settle(&account, outcome);
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All storage accounts comply with security requirements",
            |n| format!("{} violation(s) found", n),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::{ctx, resource};
    use crate::model::{ControlStatus, Remark};
    use crate::inventory::InMemoryInventory;
    use serde_json::json;

    fn container(account: &Resource, name: &str, access: &str) -> Resource {
        Resource::new(
            format!("{}/blobServices/default/containers/{}", account.id, name),
            "Microsoft.Storage/storageAccounts/blobServices/containers",
        )
        .with_properties(json!({ "publicAccess": access }))
    }

    #[tokio::test]
    async fn test_hardened_account_complies() {
        let account = resource("rg", STORAGE_ACCOUNTS, "st1")
            .with_properties(json!({ "allowSharedKeyAccess": false }));
        let inv = InMemoryInventory::new().with_bare_listings()
            .with_child(&account.id, paths::BLOB_CONTAINERS, container(&account, "logs", "None"))
            .with_resource(account);

        let result = StorageAccountSecurity.evaluate(&ctx(), &inv).await.unwrap();

        assert_eq!(result.status, ControlStatus::Pass);
        let row = &result.scanned_resources[0];
        assert_eq!(row.remark, Remark::Comply);
        assert_eq!(row.attributes.get("allowSharedKeyAccess"), Some("Disabled"));
        assert_eq!(row.attributes.get("publicContainers"), Some("None"));
    }

    #[tokio::test]
    async fn test_both_rules_fail_independently() {
        // allowSharedKeyAccess unset means enabled
        let account = resource("rg", STORAGE_ACCOUNTS, "st2");
        let inv = InMemoryInventory::new().with_bare_listings()
            .with_child(&account.id, paths::BLOB_CONTAINERS, container(&account, "web", "Blob"))
            .with_child(&account.id, paths::BLOB_CONTAINERS, container(&account, "dump", "Container"))
            .with_resource(account);

        let result = StorageAccountSecurity.evaluate(&ctx(), &inv).await.unwrap();

        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.reason, "2 violation(s) found");
        assert_eq!(result.scanned_resources.len(), 1);
        let reasons: Vec<_> = result.violating_resources.iter().map(|v| v.reason.as_str()).collect();
        assert_eq!(
            reasons,
            [
                "Access key-based access (allowSharedKeyAccess) is enabled",
                "Public blob containers: web, dump",
            ]
        );
        assert_eq!(
            result.scanned_resources[0].attributes.get("publicContainers"),
            Some("web, dump")
        );
    }
}

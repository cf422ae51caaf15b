//! Customer-managed key encryption
//!
//! Ten resource kinds, each with its own notion of "encrypted with a key
//! the customer controls". Only kinds that are also allow-listed in the
//! engine configuration are enumerated.

use crate::config::EngineConfig;
use crate::control::{fetch, violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use tracing::info;

/// How a kind exposes its customer-managed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyLookup {
    /// `encryption.keySource == "Microsoft.Keyvault"`
    StorageKeySource,
    /// `encryption.type` names a customer key
    DiskEncryptionType,
    /// non-empty `keyVaultKeyUri`
    KeyVaultKeyUri,
    /// non-empty `encryption.keyVaultProperties.keyIdentifier`
    KeyIdentifier,
    /// non-empty `keyId`
    ServerKeyId,
}

#[derive(Debug, Clone, Copy)]
struct CmkKind {
    resource_type: &'static str,
    lookup: KeyLookup,
}

static KINDS: [CmkKind; 10] = [
    CmkKind { resource_type: super::STORAGE_ACCOUNTS, lookup: KeyLookup::StorageKeySource },
    CmkKind { resource_type: super::DISKS, lookup: KeyLookup::DiskEncryptionType },
    CmkKind { resource_type: "Microsoft.DocumentDB/databaseAccounts", lookup: KeyLookup::KeyVaultKeyUri },
    CmkKind { resource_type: "Microsoft.AppConfiguration/configurationStores", lookup: KeyLookup::KeyIdentifier },
    CmkKind { resource_type: "Microsoft.ContainerRegistry/registries", lookup: KeyLookup::KeyIdentifier },
    CmkKind { resource_type: "Microsoft.MachineLearningServices/workspaces", lookup: KeyLookup::KeyIdentifier },
    CmkKind { resource_type: "Microsoft.CognitiveServices/accounts", lookup: KeyLookup::KeyIdentifier },
    CmkKind { resource_type: "Microsoft.DBforPostgreSQL/servers", lookup: KeyLookup::ServerKeyId },
    CmkKind { resource_type: "Microsoft.DBforMySQL/servers", lookup: KeyLookup::ServerKeyId },
    CmkKind { resource_type: "Microsoft.DBforMariaDB/servers", lookup: KeyLookup::ServerKeyId },
];

const CUSTOMER_KEY_DISK_TYPES: [&str; 2] = [
    "EncryptionAtRestWithCustomerKey",
    "EncryptionAtRestWithPlatformAndCustomerKeys",
];

fn non_empty(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .map_or(false, |s| !s.trim().is_empty())
}

impl KeyLookup {
    /// Whether `properties` show a customer-managed key in use
    fn uses_customer_key(&self, properties: &Value) -> bool {
        match self {
            Self::StorageKeySource => properties
                .pointer("/encryption/keySource")
                .and_then(Value::as_str)
                .map_or(false, |s| s.eq_ignore_ascii_case("Microsoft.Keyvault")),
            Self::DiskEncryptionType => properties
                .pointer("/encryption/type")
                .and_then(Value::as_str)
                .map_or(false, |t| CUSTOMER_KEY_DISK_TYPES.contains(&t)),
            Self::KeyVaultKeyUri => non_empty(properties.get("keyVaultKeyUri")),
            Self::KeyIdentifier => {
                non_empty(properties.pointer("/encryption/keyVaultProperties/keyIdentifier"))
            }
            Self::ServerKeyId => non_empty(properties.get("keyId")),
        }
    }
}

/// Customer-managed keys on storage accounts and disks
#[derive(Debug, Clone, Default)]
pub struct CmkEncryption {
    supported_types: Vec<String>,
}

impl CmkEncryption {
    /// Control reading its allow-list from `config`
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            supported_types: config.supported_types(ControlId::CmkEncryption).to_vec(),
        }
    }

    fn enabled_kinds(&self) -> impl Iterator<Item = &CmkKind> + '_ {
        KINDS.iter().filter(move |k| {
            self.supported_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(k.resource_type))
        })
    }

    async fn scan_kind(
        &self,
        kind: &CmkKind,
        inventory: &dyn InventoryProvider,
        findings: &mut Findings,
    ) -> Result<(), ControlError> {
        let mut listed = inventory.list_resources(Some(kind.resource_type));
        while let Some(resource) = listed.try_next().await? {
            let outcome = self.inspect(kind, &resource, inventory).await;
            findings.settle(&resource, outcome);
        }
        Ok(())
    }

    async fn inspect(
        &self,
        kind: &CmkKind,
        listed: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let full = fetch(inventory, listed).await?;
        let mut eval = Evaluation::new();
        if !kind.lookup.uses_customer_key(&full.properties) {
            eval.violate(violation(listed, "Customer-managed key encryption is not enabled"));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for CmkEncryption {
    fn id(&self) -> ControlId {
        ControlId::CmkEncryption
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Data encryption with customer-managed keys".into()
    }

    fn description(&self) -> &'static str {
        "Data at rest is encrypted with keys held in the customer's Key Vault"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut kinds = 0;
        for kind in self.enabled_kinds() {
            kinds += 1;
            if let Err(e) = self.scan_kind(kind, inventory, &mut findings).await {
                findings.kind_error(kind.resource_type, &e);
            }
        }
        info!("Checked {} customer-managed key kinds, {} resources", kinds, findings.scanned_count());

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All CMK-supported resources are correctly encrypted",
            |n| format!("{} resource(s) do not use customer-managed keys", n),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::fixtures::{ctx, resource};
    use crate::controls::{DISKS, STORAGE_ACCOUNTS};
    use crate::error::ProviderError;
    use crate::inventory::InMemoryInventory;
    use crate::model::{ControlStatus, Remark};
    use serde_json::json;

    const REGISTRIES: &str = "Microsoft.ContainerRegistry/registries";
    const POSTGRES: &str = "Microsoft.DBforPostgreSQL/servers";

    fn control(types: &[&str]) -> CmkEncryption {
        CmkEncryption::new(
            &EngineConfig::default().with_supported_types(ControlId::CmkEncryption, types.iter().copied()),
        )
    }

    #[test]
    fn test_key_lookups() {
        assert!(KeyLookup::StorageKeySource
            .uses_customer_key(&json!({ "encryption": { "keySource": "Microsoft.Keyvault" } })));
        assert!(!KeyLookup::StorageKeySource
            .uses_customer_key(&json!({ "encryption": { "keySource": "Microsoft.Storage" } })));
        assert!(KeyLookup::DiskEncryptionType
            .uses_customer_key(&json!({ "encryption": { "type": "EncryptionAtRestWithCustomerKey" } })));
        assert!(!KeyLookup::DiskEncryptionType
            .uses_customer_key(&json!({ "encryption": { "type": "EncryptionAtRestWithPlatformKey" } })));
        assert!(KeyLookup::KeyVaultKeyUri.uses_customer_key(&json!({ "keyVaultKeyUri": "https://kv/keys/k" })));
        assert!(!KeyLookup::KeyVaultKeyUri.uses_customer_key(&json!({ "keyVaultKeyUri": "" })));
        assert!(KeyLookup::KeyIdentifier.uses_customer_key(
            &json!({ "encryption": { "keyVaultProperties": { "keyIdentifier": "https://kv/keys/k" } } })
        ));
        assert!(KeyLookup::ServerKeyId.uses_customer_key(&json!({ "keyId": "https://kv/keys/k" })));
        assert!(!KeyLookup::ServerKeyId.uses_customer_key(&Value::Null));
    }

    #[tokio::test]
    async fn test_only_allow_listed_kinds_scanned() {
        let inv = InMemoryInventory::new()
            .with_resource(resource("rg", STORAGE_ACCOUNTS, "st1").with_properties(json!({
                "encryption": { "keySource": "Microsoft.Keyvault" }
            })))
            .with_resource(resource("rg", DISKS, "d1"))
            .with_resource(resource("rg", POSTGRES, "pg1"));

        let result = control(&[STORAGE_ACCOUNTS, POSTGRES]).evaluate(&ctx(), &inv).await.unwrap();

        assert_eq!(result.scanned_resources.len(), 2);
        assert_eq!(result.scanned_resources[0].remark, Remark::Comply);
        assert_eq!(result.violating_resources.len(), 1);
        let v = &result.violating_resources[0];
        assert_eq!(v.resource_type, POSTGRES);
        assert_eq!(v.reason, "Customer-managed key encryption is not enabled");
        assert_eq!(result.reason, "1 resource(s) do not use customer-managed keys");
    }

    #[tokio::test]
    async fn test_kind_failure_isolated() {
        let inv = InMemoryInventory::new()
            .fail_listing(REGISTRIES, ProviderError::Http("502".into()))
            .with_resource(resource("rg", DISKS, "d1").with_properties(json!({
                "encryption": { "type": "EncryptionAtRestWithPlatformAndCustomerKeys" }
            })));

        let result = control(&[REGISTRIES, DISKS]).evaluate(&ctx(), &inv).await.unwrap();

        assert_eq!(result.status, ControlStatus::Fail);
        assert_eq!(result.scanned_resources.len(), 1);
        assert_eq!(result.scanned_resources[0].remark, Remark::Comply);
        let synthetic = &result.violating_resources[0];
        assert_eq!(synthetic.resource_type, REGISTRIES);
        assert_eq!(synthetic.name, "All");
    }

    #[tokio::test]
    async fn test_nothing_allow_listed_passes() {
        let inv = InMemoryInventory::new().with_resource(resource("rg", DISKS, "d1"));
        let result = control(&[]).evaluate(&ctx(), &inv).await.unwrap();
        assert_eq!(result.status, ControlStatus::Pass);
        assert!(result.scanned_resources.is_empty());
    }
}

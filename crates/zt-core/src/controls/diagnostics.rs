//! Diagnostic settings on allow-listed resource types

use crate::config::EngineConfig;
use crate::control::{violation, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::debug;

/// Types whose settings live on their sub-services, not the account
const SERVICE_SCOPED: [&str; 2] = [super::STORAGE_ACCOUNTS, "Microsoft.DataLakeStore/accounts"];

/// Diagnostic settings on every allow-listed resource
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    supported_types: Vec<String>,
}

impl Diagnostics {
    /// Control reading its allow-list from `config`
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            supported_types: config.supported_types(ControlId::Diagnostics).to_vec(),
        }
    }

    fn is_supported(&self, resource_type: &str) -> bool {
        self.supported_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(resource_type))
    }

    async fn has_settings(
        &self,
        resource: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<bool, ControlError> {
        if !SERVICE_SCOPED.iter().any(|t| resource.is_type(t)) {
            let settings = inventory
                .list_children(&resource.id, paths::DIAGNOSTIC_SETTINGS)
                .await?;
            return Ok(!settings.is_empty());
        }

        // A failed sub-service only counts when no other one has settings
        let mut first_error = None;
        for service in paths::STORAGE_SERVICES {
            let service_id = format!("{}/{}", resource.id.trim_end_matches('/'), service);
            match inventory
                .list_children(&service_id, paths::DIAGNOSTIC_SETTINGS)
                .await
            {
                Ok(settings) if !settings.is_empty() => return Ok(true),
                Ok(_) => {}
                Err(e) => {
                    debug!("Diagnostic settings lookup failed for {}: {}", service_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(false),
        }
    }

    async fn inspect(
        &self,
        resource: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let mut eval = Evaluation::new();
        if !self.has_settings(resource, inventory).await? {
            eval.violate(violation(resource, "Missing diagnostic settings"));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for Diagnostics {
    fn id(&self) -> ControlId {
        ControlId::Diagnostics
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Diagnostics Settings Check for Azure Resources".into()
    }

    fn description(&self) -> &'static str {
        "Supported resources forward logs through at least one diagnostic setting"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        if self.supported_types.is_empty() {
            tracing::warn!("No resource types allow-listed for diagnostics, nothing to scan");
        } else {
            let mut resources = inventory.list_resources(None);
            while let Some(resource) = resources.try_next().await? {
                if !self.is_supported(&resource.resource_type) {
                    continue;
                }
                let outcome = self.inspect(&resource, inventory).await;
                findings.settle(&resource, outcome);
            }
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All resources have diagnostic settings",
            |n| format!("{} resource(s) missing diagnostics", n),
        ))
    }
}

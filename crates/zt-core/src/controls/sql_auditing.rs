//! SQL server auditing

use super::SQL_SERVERS;
use crate::control::{violation_as, Control, ControlMeta, Evaluation, Findings};
use crate::error::ControlError;
use crate::inventory::{paths, InventoryProvider, Resource};
use crate::model::{ControlId, ControlResult, ScanContext};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuditingProperties {
    state: Option<String>,
}

/// Auditing on SQL servers and their databases
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlAuditing;

impl SqlAuditing {
    async fn inspect(
        &self,
        server: &Resource,
        inventory: &dyn InventoryProvider,
    ) -> Result<Evaluation, ControlError> {
        let policy = inventory.get_child(&server.id, paths::SQL_AUDITING).await?;
        let state = policy.properties_as::<AuditingProperties>()?.state;

        let mut eval = Evaluation::new()
            .attribute("auditingState", state.clone().unwrap_or_else(|| "Unknown".into()));
        if state.as_deref() != Some("Enabled") {
            eval.violate(violation_as(server, "SQL Server", "SQL auditing is not enabled"));
        }
        Ok(eval)
    }
}

#[async_trait]
impl Control for SqlAuditing {
    fn id(&self) -> ControlId {
        ControlId::SqlAuditing
    }

    fn policy(&self, _ctx: &ScanContext) -> String {
        "Ensure SQL Servers have auditing enabled".into()
    }

    fn description(&self) -> &'static str {
        "SQL servers record database events to an audit log"
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError> {
        let mut findings = Findings::new();
        let mut servers = inventory.list_resources(Some(SQL_SERVERS));
        while let Some(server) = servers.try_next().await? {
            if server.resource_group().is_none() {
                continue;
            }
            let outcome = self.inspect(&server, inventory).await;
            findings.settle_as(&server, "SQL Server", outcome);
        }

        Ok(findings.finish(
            ControlMeta::of(self, ctx),
            "All SQL Servers have auditing enabled.",
            |n| format!("{} SQL Server(s) auditing is disabled.", n),
        ))
    }
}

//! Control contract
//!
//! A control inspects one resource family and always yields a
//! [`ControlResult`]. The bookkeeping every control shares (one scanned
//! row per inspected resource, one violation per failed sub-rule,
//! per-resource and per-kind failure isolation, status and reason
//! derivation) lives in [`Findings`] so the controls only carry their
//! classification logic.

use crate::error::ControlError;
use crate::inventory::{InventoryProvider, Resource};
use crate::model::{
    Attributes, ControlId, ControlResult, ControlStatus, Remark, ScanContext, ScannedResource,
    ViolatingResource,
};
use async_trait::async_trait;
use std::fmt::Display;
use tracing::{debug, warn};

/// A self-contained unit of policy logic
#[async_trait]
pub trait Control: Send + Sync {
    /// Stable identifier, also the result slot key
    fn id(&self) -> ControlId;

    /// Policy title as shown in the report
    fn policy(&self, ctx: &ScanContext) -> String;

    /// One-line rationale shown next to the policy
    fn description(&self) -> &'static str;

    /// Inspect the inventory. `Err` means the control could not run at all.
    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Result<ControlResult, ControlError>;
}

/// Violation row for `resource` carrying its id and resource group
pub fn violation(resource: &Resource, reason: impl Into<String>) -> ViolatingResource {
    violation_as(resource, resource.resource_type.clone(), reason)
}

/// Same as [`violation`] with a display label instead of the ARM type
pub fn violation_as(
    resource: &Resource,
    label: impl Into<String>,
    reason: impl Into<String>,
) -> ViolatingResource {
    ViolatingResource::new(label, resource.name.clone(), reason)
        .with_id(resource.id.clone())
        .with_resource_group(resource.resource_group())
}

/// Resource group of a group-scoped resource
pub fn require_group(resource: &Resource) -> Result<&str, ControlError> {
    resource
        .resource_group()
        .ok_or_else(|| ControlError::Malformed {
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
            message: "resource id has no resource group".into(),
        })
}

/// Full definition of a listed resource
pub async fn fetch(
    inventory: &dyn InventoryProvider,
    listed: &Resource,
) -> Result<Resource, ControlError> {
    let rg = require_group(listed)?;
    Ok(inventory
        .get_properties(&listed.resource_type, rg, &listed.name)
        .await?)
}

/// Verdict on one resource, built before anything is recorded
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Evidence columns for the scanned row
    pub attributes: Attributes,
    remark: Option<Remark>,
    /// Violated sub-rules
    pub violations: Vec<ViolatingResource>,
}

impl Evaluation {
    /// Compliant evaluation with no attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evidence column
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// Record a failed sub-rule
    pub fn violate(&mut self, violation: ViolatingResource) {
        self.violations.push(violation);
    }

    /// Override the remark derived from the violations
    pub fn with_remark(mut self, remark: Remark) -> Self {
        self.remark = Some(remark);
        self
    }

    /// True when no sub-rule failed
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    /// Remark for the scanned row
    pub fn remark(&self) -> Remark {
        self.remark
            .clone()
            .unwrap_or_else(|| Remark::from_compliant(self.is_compliant()))
    }
}

/// Per-invocation accumulator. Create one per `evaluate` call.
#[derive(Debug, Default)]
pub struct Findings {
    scanned: Vec<ScannedResource>,
    violations: Vec<ViolatingResource>,
}

impl Findings {
    /// Empty findings
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict on one inspected resource
    pub fn record(&mut self, resource_type: &str, name: &str, evaluation: Evaluation) {
        let remark = evaluation.remark();
        debug!("{} '{}': {}", resource_type, name, remark);
        self.scanned.push(ScannedResource {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            attributes: evaluation.attributes,
            remark,
        });
        self.violations.extend(evaluation.violations);
    }

    /// Record the outcome of inspecting `resource`; failures stay local to it
    pub fn settle(&mut self, resource: &Resource, outcome: Result<Evaluation, ControlError>) {
        let label = resource.resource_type.clone();
        self.settle_as(resource, &label, outcome);
    }

    /// [`Findings::settle`] with a display label on error violations
    pub fn settle_as(
        &mut self,
        resource: &Resource,
        label: &str,
        outcome: Result<Evaluation, ControlError>,
    ) {
        match outcome {
            Ok(evaluation) => self.record(&resource.resource_type, &resource.name, evaluation),
            Err(err) => self.resource_error(resource, label, &err),
        }
    }

    /// Inspection of one resource failed
    pub fn resource_error(&mut self, resource: &Resource, label: &str, err: &dyn Display) {
        warn!("Check failed for {} '{}': {}", resource.resource_type, resource.name, err);
        self.scanned.push(ScannedResource {
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
            attributes: Attributes::new(),
            remark: Remark::Error,
        });
        self.violations
            .push(violation_as(resource, label, format!("Error: {}", err)));
    }

    /// Enumeration of a whole resource kind failed
    pub fn kind_error(&mut self, label: &str, err: &dyn Display) {
        warn!("Sub-scan failed for {}: {}", label, err);
        self.violations.push(
            ViolatingResource::new(label, "All", format!("Error: {}", err))
                .with_resource_group(Some("Unknown")),
        );
    }

    /// Violations recorded so far, errors included
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Scanned rows recorded so far
    pub fn scanned_count(&self) -> usize {
        self.scanned.len()
    }

    /// Seal the findings into a result
    pub fn finish(
        self,
        meta: ControlMeta,
        pass_reason: impl Into<String>,
        fail_reason: impl FnOnce(usize) -> String,
    ) -> ControlResult {
        let (status, reason) = if self.violations.is_empty() {
            (ControlStatus::Pass, pass_reason.into())
        } else {
            (ControlStatus::Fail, fail_reason(self.violations.len()))
        };

        ControlResult {
            control: meta.id,
            policy: meta.policy,
            description: meta.description.to_string(),
            status,
            reason,
            scanned_resources: self.scanned,
            violating_resources: self.violations,
            error: None,
        }
    }
}

/// Identity block stamped on a result
#[derive(Debug, Clone)]
pub struct ControlMeta {
    /// Control identity
    pub id: ControlId,
    /// Policy title for this scan
    pub policy: String,
    /// Rationale
    pub description: &'static str,
}

impl ControlMeta {
    /// Identity of `control` for `ctx`
    pub fn of<C: Control + ?Sized>(control: &C, ctx: &ScanContext) -> Self {
        Self {
            id: control.id(),
            policy: control.policy(ctx),
            description: control.description(),
        }
    }
}

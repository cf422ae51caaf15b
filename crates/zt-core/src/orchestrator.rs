//! Control orchestration
//!
//! Runs the configured controls against one inventory and returns one
//! result per control, always in configured order. A control that fails
//! or panics is replaced by an `ERROR` result and never stops the rest.

use crate::config::{EngineConfig, ExecutionMode};
use crate::control::Control;
use crate::controls::default_controls;
use crate::inventory::InventoryProvider;
use crate::model::{ControlResult, ScanContext};
use futures::future::{join_all, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs a fixed, ordered list of controls against one inventory
pub struct Orchestrator {
    controls: Vec<Arc<dyn Control>>,
    mode: ExecutionMode,
}

impl Orchestrator {
    /// Controls run in the order given
    pub fn new(controls: Vec<Arc<dyn Control>>, mode: ExecutionMode) -> Self {
        Self { controls, mode }
    }

    /// The ten default controls, scheduled as configured
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(default_controls(config), config.execution)
    }

    /// Controls in result order
    pub fn controls(&self) -> &[Arc<dyn Control>] {
        &self.controls
    }

    /// Scheduling mode
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run every control; `results[i]` belongs to `controls[i]`
    pub async fn run(
        &self,
        ctx: &ScanContext,
        inventory: &dyn InventoryProvider,
    ) -> Vec<ControlResult> {
        info!(
            "Running {} controls ({:?}) for subscription {}",
            self.controls.len(),
            self.mode,
            ctx.subscription_id
        );

        match self.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(self.controls.len());
                for control in &self.controls {
                    results.push(run_isolated(control.as_ref(), ctx, inventory).await);
                }
                results
            }
            ExecutionMode::Concurrent => {
                join_all(
                    self.controls
                        .iter()
                        .map(|control| run_isolated(control.as_ref(), ctx, inventory)),
                )
                .await
            }
        }
    }
}

/// Evaluate one control, converting errors and panics into an `ERROR` result
pub async fn run_isolated(
    control: &dyn Control,
    ctx: &ScanContext,
    inventory: &dyn InventoryProvider,
) -> ControlResult {
    let id = control.id();
    let started = Instant::now();
    info!("Control {} started", id);

    let outcome = AssertUnwindSafe(control.evaluate(ctx, inventory))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("Control {} failed: {}", id, e);
            ControlResult::errored(id, control.policy(ctx), control.description(), e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Control {} panicked: {}", id, message);
            ControlResult::errored(id, control.policy(ctx), control.description(), message)
        }
    };

    info!(
        "Control {} finished: {} ({} scanned, {} violations) in {:?}",
        id,
        result.status,
        result.scanned_resources.len(),
        result.violating_resources.len(),
        started.elapsed()
    );
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("control panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("control panicked: {}", s)
    } else {
        "control panicked".to_string()
    }
}

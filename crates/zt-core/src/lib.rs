//! Zero Trust Assessment Engine
//!
//! Runs a fixed battery of Zero Trust controls against the resource
//! inventory of one cloud subscription and aggregates the outcome into a
//! per-control verdict plus subscription-level totals.
//!
//! # Controls
//!
//! 1. Public IP addresses
//! 2. PaaS private access (nine kinds)
//! 3. Diagnostic settings
//! 4. Storage account security
//! 5. Managed disk security
//! 6. Virtual network DNS
//! 7. SQL auditing
//! 8. VNet peering
//! 9. Subnet NSG association
//! 10. Customer-managed key encryption (ten kinds)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      ZERO TRUST ASSESSMENT                           │
//! │                                                                      │
//! │   ScanRequest ──▶ ScanService ──▶ InventoryConnector ──▶ Inventory   │
//! │                        │                                     │       │
//! │                 ┌──────▼────────────────────────────────┐    │       │
//! │                 │            ORCHESTRATOR               │◀───┘       │
//! │                 │  Control 1 │ Control 2 │ ... │ Ctl 10 │            │
//! │                 │  (isolated, results in fixed order)   │            │
//! │                 └──────┬────────────────────────────────┘            │
//! │                        │                                             │
//! │                 ┌──────▼──────┐      ┌────────────────────┐          │
//! │                 │  Aggregate  │ ───▶ │ Renderer  /  Store │          │
//! │                 │ pass / fail │      │  (HTML report)     │          │
//! │                 └─────────────┘      └────────────────────┘          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod aggregate;
pub mod config;
pub mod control;
pub mod controls;
pub mod credential;
pub mod error;
pub mod inventory;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod resource_id;
pub mod service;

pub use aggregate::{summarize, summarize_one};
pub use config::{EngineConfig, ExecutionMode};
pub use control::{Control, Evaluation, Findings};
pub use controls::default_controls;
pub use credential::{CredentialProvider, StaticToken, MANAGEMENT_SCOPE};
pub use error::{ConfigError, ControlError, ProviderError, ProviderResult, ScanError};
pub use inventory::{
    InMemoryInventory, InventoryConnector, InventoryProvider, Resource, ResourceStream,
    StaticConnector,
};
pub use model::{
    Attributes, ClientCredentials, ControlId, ControlResult, ControlStatus, Remark, ScanContext,
    ScanSummary, ScannedResource, ViolatingResource,
};
pub use orchestrator::Orchestrator;
pub use report::{RenderError, ReportArtifact, ReportInput, ReportRenderer, ReportStore};
pub use service::{ScanOutcome, ScanRequest, ScanService};

//! Report Renderer capability

use crate::model::{ControlResult, ScanSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Everything a renderer needs for one scan
#[derive(Debug, Clone)]
pub struct ReportInput {
    /// Results in control order
    pub results: Vec<ControlResult>,
    /// Totals over `results`
    pub summary: ScanSummary,
    /// Subscription id
    pub subscription_id: String,
    /// Display name, or the id when unknown
    pub subscription_name: String,
    /// Wall-clock time spent running controls
    pub scan_duration: Duration,
    /// Report timestamp
    pub generated_at: DateTime<Utc>,
}

/// A rendered document, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    /// Bare file name the store writes under
    pub file_name: String,
    /// Document body
    pub content: String,
}

/// Rendering or storage failure
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template could not be compiled or rendered
    #[error("template error: {0}")]
    Template(String),

    /// Storage failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns results into a document
pub trait ReportRenderer: Send + Sync {
    /// Render one scan into a document
    fn render(&self, input: &ReportInput) -> Result<ReportArtifact, RenderError>;
}

/// Persists a rendered document
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store the artifact and return the path it is served under
    async fn store(&self, artifact: &ReportArtifact) -> Result<String, RenderError>;
}

//! On-disk report store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use zt_core::{RenderError, ReportArtifact, ReportStore};

/// URL prefix stored reports are served under
pub const REPORTS_PREFIX: &str = "/reports";

/// A bare file name: no separators, no parent references
pub fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

/// Writes reports into one directory, created on demand
#[derive(Debug, Clone)]
pub struct FileReportStore {
    dir: PathBuf,
}

impl FileReportStore {
    /// Store writing under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Report directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Contents of a stored report. `None` when absent or not a valid name.
    pub async fn load(&self, file_name: &str) -> Result<Option<String>, RenderError> {
        if !is_valid_file_name(file_name) {
            return Ok(None);
        }
        match tokio::fs::read_to_string(self.dir.join(file_name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn store(&self, artifact: &ReportArtifact) -> Result<String, RenderError> {
        if !is_valid_file_name(&artifact.file_name) {
            return Err(RenderError::Template(format!(
                "invalid report file name: {}",
                artifact.file_name
            )));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&artifact.file_name);
        tokio::fs::write(&path, &artifact.content).await?;
        info!("Wrote report {} ({} bytes)", path.display(), artifact.content.len());

        Ok(format!("{}/{}", REPORTS_PREFIX, artifact.file_name))
    }
}

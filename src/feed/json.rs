//! JSON file replay source

use super::types::ReplayFile;
use super::{ReplayBatch, SourceError, TickSource};
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads recorded batches from a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Create a source for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being read
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl TickSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<ReplayBatch>, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        let file: ReplayFile = serde_json::from_str(&content)?;
        let batches = file.into_batches();

        tracing::info!(
            path = %self.path.display(),
            batches = batches.len(),
            "Loaded replay file"
        );
        Ok(batches)
    }
}

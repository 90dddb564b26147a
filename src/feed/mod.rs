//! Tick source module
//!
//! Loads recorded primary/hedge streams for replay

mod json;
mod types;

pub use json::JsonFileSource;
pub use types::{ReplayBatch, Settlement};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading a tick source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The content is not a valid replay document
    #[error("Invalid replay document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Trait for tick source implementations
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Load every batch the source holds
    async fn load(&self) -> Result<Vec<ReplayBatch>, SourceError>;
}

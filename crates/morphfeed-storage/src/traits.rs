//! Object storage seam
//!
//! Sources and composites are uploaded once and referenced afterwards by
//! `public_id` (on assets) or `url` (when handed to the generation endpoint).

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A durable object produced by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Opaque identifier kept on assets
    pub public_id: String,
    /// Publicly reachable URL handed to the generation endpoint
    pub url: String,
}

/// Storage abstraction trait
///
/// Implementations must be safe to share across concurrent branches of a run.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a file and return its durable location
    async fn upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<StoredObject>;

    /// Download a file by its public id
    async fn download(&self, public_id: &str) -> StorageResult<Vec<u8>>;

    /// Public URL for a previously uploaded object
    fn public_url(&self, public_id: &str) -> String;
}

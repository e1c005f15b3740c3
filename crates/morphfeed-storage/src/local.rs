use crate::keys::{generate_storage_key, is_safe_key};
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Objects written under a root directory and served from `base_url`.
///
/// The base URL must be reachable by the generation endpoint, since
/// uploaded sources are handed to it by URL.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

fn io_failure(action: &str, path: &Path, err: std::io::Error) -> String {
    format!("Failed to {} {}: {}", action, path.display(), err)
}

impl LocalStorage {
    /// Open (and create if needed) the storage root.
    pub async fn new(root: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::ConfigError(io_failure("create storage root", &root, e)))?;

        Ok(Self { root, base_url })
    }

    /// Resolve a public id under the root; keys that could escape it are rejected.
    fn resolve(&self, public_id: &str) -> StorageResult<PathBuf> {
        if is_safe_key(public_id) {
            Ok(self.root.join(public_id))
        } else {
            Err(StorageError::InvalidKey(public_id.to_string()))
        }
    }

    async fn write_object(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let upload_err = |action: &str, e| StorageError::UploadFailed(io_failure(action, path, e));

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| upload_err("create directory for", e))?;
        }
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| upload_err("create", e))?;
        file.write_all(data)
            .await
            .map_err(|e| upload_err("write", e))?;
        // Durable before the URL is handed to anyone
        file.sync_all().await.map_err(|e| upload_err("sync", e))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<StoredObject> {
        let public_id = generate_storage_key(owner_id, filename);
        let path = self.resolve(&public_id)?;
        let started = Instant::now();

        self.write_object(&path, &data).await?;

        tracing::info!(
            public_id = %public_id,
            content_type = content_type,
            size_bytes = data.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Stored object on local disk"
        );

        Ok(StoredObject {
            url: self.public_url(&public_id),
            public_id,
        })
    }

    async fn download(&self, public_id: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(public_id)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(public_id.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(io_failure("read", &path, e))),
        }
    }

    fn public_url(&self, public_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), public_id)
    }
}

#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{InMemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use morphfeed_core::StorageSettings;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(settings: &StorageSettings) -> StorageResult<Arc<dyn Storage>> {
    match settings.backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = settings.local_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = settings.local_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; uploads are lost when the process exits");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let settings = StorageSettings {
            backend: StorageBackend::Memory,
            local_path: None,
            local_base_url: None,
        };
        let storage = create_storage(&settings).await.unwrap();
        assert!(storage.public_url("uploads/a.png").starts_with("memory://"));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn test_local_storage_requires_path() {
        let settings = StorageSettings {
            backend: StorageBackend::Local,
            local_path: None,
            local_base_url: Some("http://localhost/media".to_string()),
        };
        assert!(matches!(
            create_storage(&settings).await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[cfg(feature = "storage-local")]
    #[tokio::test]
    async fn test_create_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            backend: StorageBackend::Local,
            local_path: Some(dir.path().to_string_lossy().to_string()),
            local_base_url: Some("http://localhost/media".to_string()),
        };
        let storage = create_storage(&settings).await.unwrap();
        assert_eq!(
            storage.public_url("uploads/a.png"),
            "http://localhost/media/uploads/a.png"
        );
    }
}

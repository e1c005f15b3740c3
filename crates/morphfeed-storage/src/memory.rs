//! In-memory storage backend
//!
//! Used by tests and by the CLI when no filesystem root is wanted. Objects
//! live only as long as the process.

use crate::keys::{generate_storage_key, is_safe_key};
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MEMORY_BASE_URL: &str = "memory://morphfeed";

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    objects: Arc<Mutex<HashMap<String, StoredEntry>>>,
}

#[derive(Clone)]
struct StoredEntry {
    content_type: String,
    data: Vec<u8>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, public_id: &str) -> Option<String> {
        self.lock().get(public_id).map(|e| e.content_type.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredEntry>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_key(public_id: &str) -> StorageResult<()> {
        if is_safe_key(public_id) {
            Ok(())
        } else {
            Err(StorageError::InvalidKey(public_id.to_string()))
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<StoredObject> {
        let key = generate_storage_key(owner_id, filename);
        let size = data.len();
        self.lock().insert(
            key.clone(),
            StoredEntry {
                content_type: content_type.to_string(),
                data,
            },
        );

        tracing::debug!(key = %key, size_bytes = size, "In-memory storage upload successful");

        Ok(StoredObject {
            url: self.public_url(&key),
            public_id: key,
        })
    }

    async fn download(&self, public_id: &str) -> StorageResult<Vec<u8>> {
        Self::check_key(public_id)?;
        self.lock()
            .get(public_id)
            .map(|e| e.data.clone())
            .ok_or_else(|| StorageError::NotFound(public_id.to_string()))
    }

    fn public_url(&self, public_id: &str) -> String {
        format!("{}/{}", MEMORY_BASE_URL, public_id)
    }
}

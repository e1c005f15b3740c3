use chrono::{DateTime, Utc};
use morphfeed_core::models::Asset;
use morphfeed_core::{CorrelationId, IdGenerator, UuidGenerator};
use morphfeed_db::AssetRepository;
use morphfeed_generation::Generator;
use morphfeed_storage::{Storage, StoredObject};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::source::SourceFile;

/// Collaborators shared by every pipeline service.
#[derive(Clone)]
pub struct PipelineContext {
    pub storage: Arc<dyn Storage>,
    pub repository: Arc<dyn AssetRepository>,
    pub generator: Arc<dyn Generator>,
    pub ids: Arc<dyn IdGenerator>,
}

impl PipelineContext {
    pub fn new(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn AssetRepository>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            storage,
            repository,
            generator,
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn next_id(&self) -> Uuid {
        self.ids.next_id()
    }

    pub fn new_correlation_id(&self) -> CorrelationId {
        CorrelationId::generate(self.ids.as_ref())
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Upload the run's source once; the result is shared read-only by every branch.
    pub async fn upload_source(
        &self,
        owner_id: Uuid,
        file: &SourceFile,
        correlation_id: CorrelationId,
    ) -> Result<StoredObject, PipelineError> {
        if file.data.is_empty() {
            return Err(PipelineError::Source("source file is empty".to_string()));
        }

        let stored = self
            .storage
            .upload(
                owner_id,
                &file.filename,
                &file.content_type,
                file.data.clone(),
            )
            .await?;

        tracing::info!(
            correlation_id = %correlation_id,
            public_id = %stored.public_id,
            size_bytes = file.data.len(),
            "Source uploaded"
        );
        Ok(stored)
    }

    pub async fn insert(&self, asset: &Asset) -> Result<Asset, PipelineError> {
        self.repository
            .create_asset(asset)
            .await
            .map_err(PipelineError::persistence)
    }

    pub async fn save(&self, asset: &Asset) -> Result<Asset, PipelineError> {
        self.repository
            .update_asset(asset)
            .await
            .map_err(PipelineError::persistence)
    }
}

//! In-process asset repository for tests and database-less CLI runs.

use anyhow::Result;
use async_trait::async_trait;
use morphfeed_core::models::{Asset, AssetStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::assets::{clamp_feed_limit, AssetRepository};

#[derive(Clone, Default)]
pub struct InMemoryAssetRepository {
    assets: Arc<Mutex<HashMap<Uuid, Asset>>>,
}

impl InMemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Asset>> {
        self.assets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every stored asset, oldest first.
    pub fn all(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.lock().values().cloned().collect();
        assets.sort_by_key(|a| a.created_at);
        assets
    }
}

#[async_trait]
impl AssetRepository for InMemoryAssetRepository {
    async fn create_asset(&self, asset: &Asset) -> Result<Asset> {
        let mut assets = self.lock();
        let stored = assets.entry(asset.id).or_insert_with(|| asset.clone());
        Ok(stored.clone())
    }

    async fn update_asset(&self, asset: &Asset) -> Result<Asset> {
        let mut assets = self.lock();
        let stored = assets
            .get_mut(&asset.id)
            .ok_or_else(|| anyhow::anyhow!("Asset {} not found", asset.id))?;

        let published_at = stored.published_at.or(asset.published_at);
        stored.source_ref = asset.source_ref.clone();
        stored.status = asset.status;
        stored.visibility = asset.visibility;
        stored.published_at = published_at;
        stored.failure_reason = asset.failure_reason.clone();
        stored.metadata = asset.metadata.clone();
        stored.updated_at = asset.updated_at;
        Ok(stored.clone())
    }

    async fn get_asset(&self, id: Uuid) -> Result<Option<Asset>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn list_feed(&self, limit: i64) -> Result<Vec<Asset>> {
        let mut feed: Vec<Asset> = self
            .lock()
            .values()
            .filter(|a| a.visibility.is_public && a.status == AssetStatus::Ready)
            .cloned()
            .collect();
        feed.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        feed.truncate(clamp_feed_limit(limit) as usize);
        Ok(feed)
    }
}

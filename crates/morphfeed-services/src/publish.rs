use morphfeed_core::models::{Asset, Visibility};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;

/// Visibility changes and the public feed.
#[derive(Clone)]
pub struct PublishService {
    ctx: PipelineContext,
}

impl PublishService {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Make a ready asset visible. Anything not `ready` is rejected with
    /// `NotReady`; republishing only updates the visibility flags.
    pub async fn publish(
        &self,
        asset_id: Uuid,
        visibility: Visibility,
    ) -> Result<Asset, PipelineError> {
        let mut asset = self
            .ctx
            .repository
            .get_asset(asset_id)
            .await
            .map_err(PipelineError::persistence)?
            .ok_or(PipelineError::NotFound(asset_id))?;

        asset.publish(visibility, self.ctx.now())?;
        let asset = self.ctx.save(&asset).await?;

        tracing::info!(
            asset_id = %asset.id,
            is_public = asset.visibility.is_public,
            allow_remix = asset.visibility.allow_remix,
            "Asset published"
        );
        Ok(asset)
    }

    /// Public, ready assets, newest first.
    pub async fn feed(&self, limit: i64) -> Result<Vec<Asset>, PipelineError> {
        self.ctx
            .repository
            .list_feed(limit)
            .await
            .map_err(PipelineError::persistence)
    }
}

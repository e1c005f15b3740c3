//! Single-recipe generation and remixes.
//!
//! One asset corresponds to exactly one invocation: it is persisted in
//! `queued`, moved to `processing` before the call is dispatched, then to
//! `ready` or `failed` depending on the outcome.

use morphfeed_core::models::{Asset, NewAsset, Recipe};
use morphfeed_core::CorrelationId;
use morphfeed_generation::InvocationRequest;
use serde_json::json;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::source::{CleanupGuard, SourceProvider};

#[derive(Clone)]
pub struct GenerationService {
    ctx: PipelineContext,
}

impl GenerationService {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Generate one asset from a fresh source.
    ///
    /// On invocation failure the asset is persisted as `failed` and the
    /// invocation error is returned.
    pub async fn generate(
        &self,
        owner_id: Uuid,
        source: &dyn SourceProvider,
        recipe: &Recipe,
    ) -> Result<Asset, PipelineError> {
        let guard = CleanupGuard::new(source);
        recipe.validate()?;

        let file = guard
            .provider()
            .resolve()
            .await
            .map_err(|e| PipelineError::Source(format!("{:#}", e)))?;

        let correlation_id = self.ctx.new_correlation_id();
        let stored = self
            .ctx
            .upload_source(owner_id, &file, correlation_id)
            .await?;

        let input = NewAsset::new(owner_id, stored.public_id.clone())
            .with_media_kind(file.media_kind())
            .with_recipe(recipe.to_ref())
            .with_metadata(json!({
                "correlation_id": correlation_id,
                "recipe_kind": recipe.kind_name(),
            }));

        let asset = self
            .run_single(input, &stored.url, recipe, correlation_id)
            .await;
        guard.release();
        asset
    }

    /// Generate a derivative of an existing asset.
    ///
    /// The parent must be `ready` and allow remixes. Its output becomes the
    /// source and the new asset records the parent as lineage.
    pub async fn remix(
        &self,
        owner_id: Uuid,
        parent_id: Uuid,
        recipe: &Recipe,
    ) -> Result<Asset, PipelineError> {
        recipe.validate()?;

        let parent = self
            .ctx
            .repository
            .get_asset(parent_id)
            .await
            .map_err(PipelineError::persistence)?
            .ok_or(PipelineError::NotFound(parent_id))?;

        if !parent.is_remixable() {
            tracing::debug!(
                parent_id = %parent_id,
                status = %parent.status,
                allow_remix = parent.visibility.allow_remix,
                "Remix rejected"
            );
            return Err(PipelineError::RemixNotAllowed(parent_id));
        }

        let correlation_id = self.ctx.new_correlation_id();
        let input = NewAsset::new(owner_id, parent.source_ref.clone())
            .with_media_kind(parent.media_kind)
            .with_recipe(recipe.to_ref())
            .with_lineage(parent.id)
            .with_metadata(json!({
                "correlation_id": correlation_id,
                "recipe_kind": recipe.kind_name(),
                "remix_of": parent.id,
            }));

        self.run_single(input, &parent.source_ref, recipe, correlation_id)
            .await
    }

    async fn run_single(
        &self,
        input: NewAsset,
        source_url: &str,
        recipe: &Recipe,
        correlation_id: CorrelationId,
    ) -> Result<Asset, PipelineError> {
        let ctx = &self.ctx;

        let mut asset = Asset::create(input, ctx.next_id(), ctx.now())?;
        ctx.insert(&asset).await?;

        asset.begin_processing(ctx.now())?;
        ctx.save(&asset).await?;

        tracing::info!(
            correlation_id = %correlation_id,
            asset_id = %asset.id,
            recipe_id = %recipe.id(),
            "Asset processing started"
        );

        let request = InvocationRequest::for_recipe(source_url, recipe, correlation_id);
        match ctx.generator.invoke(&request).await {
            Ok(success) => {
                asset.complete(success.output_url, ctx.now())?;
                let asset = ctx.save(&asset).await?;
                tracing::info!(
                    correlation_id = %correlation_id,
                    asset_id = %asset.id,
                    attempts = success.attempts,
                    "Asset ready"
                );
                Ok(asset)
            }
            Err(err) => {
                asset.fail(err.to_string(), ctx.now())?;
                // The invocation error is what the caller needs to see
                if let Err(save_err) = ctx.save(&asset).await {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        asset_id = %asset.id,
                        error = %save_err,
                        "Failed to persist failed asset"
                    );
                }
                tracing::warn!(
                    correlation_id = %correlation_id,
                    asset_id = %asset.id,
                    error_kind = %err.kind(),
                    "Asset generation failed"
                );
                Err(PipelineError::invocation(recipe.id(), err))
            }
        }
    }
}

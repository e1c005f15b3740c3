//! StyleClash: two styles applied to the same source, merged side by side.
//!
//! Both branches must succeed. The first failure fails the run, while the
//! sibling branch keeps running as its own task until it finishes or times
//! out. The merged JPEG is uploaded and recorded as a single asset without
//! lineage; the two style ids live in its metadata.

use bytes::Bytes;
use morphfeed_core::models::{Asset, MediaKind, NewAsset, Recipe};
use morphfeed_core::{AssetError, CorrelationId};
use morphfeed_generation::InvocationRequest;
use morphfeed_processing::{compose_bytes, CompositeImage, Orientation};
use morphfeed_storage::StoredObject;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use tokio::task::JoinHandle;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::source::{CleanupGuard, SourceFile, SourceProvider};

#[derive(Clone)]
pub struct PairCompositor {
    ctx: PipelineContext,
}

impl PairCompositor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        owner_id: Uuid,
        source: &dyn SourceProvider,
        style_a: &Recipe,
        style_b: &Recipe,
        orientation: Orientation,
    ) -> Result<Asset, PipelineError> {
        let guard = CleanupGuard::new(source);
        style_a.validate()?;
        style_b.validate()?;
        if style_a.id() == style_b.id() {
            return Err(AssetError::Validation(format!(
                "a clash needs two different styles, got '{}' twice",
                style_a.id()
            ))
            .into());
        }

        let file = guard
            .provider()
            .resolve()
            .await
            .map_err(|e| PipelineError::Source(format!("{:#}", e)))?;

        let correlation_id = self.ctx.new_correlation_id();
        let span = tracing::info_span!(
            "clash",
            correlation_id = %correlation_id,
            style_a = %style_a.id(),
            style_b = %style_b.id(),
            %orientation
        );

        let result = self
            .execute(owner_id, &file, [style_a, style_b], orientation, correlation_id)
            .instrument(span)
            .await;

        if let Err(err) = &result {
            tracing::warn!(
                correlation_id = %correlation_id,
                error_kind = %err.kind(),
                error = %err,
                "Clash failed"
            );
        }
        guard.release();
        result
    }

    async fn execute(
        &self,
        owner_id: Uuid,
        file: &SourceFile,
        styles: [&Recipe; 2],
        orientation: Orientation,
        correlation_id: CorrelationId,
    ) -> Result<Asset, PipelineError> {
        let stored = self
            .ctx
            .upload_source(owner_id, file, correlation_id)
            .await?;

        // Dropping a handle detaches its task, so an early error leaves the
        // sibling running
        let [branch_a, branch_b] = styles.map(|style| {
            tokio::spawn(
                render(self.ctx.clone(), stored.url.clone(), style.clone(), correlation_id)
                    .in_current_span(),
            )
        });
        let (image_a, image_b) = tokio::try_join!(join_branch(branch_a), join_branch(branch_b))?;

        let composite = compose(image_a, image_b, orientation).await?;
        self.persist(owner_id, &stored, styles, orientation, composite, correlation_id)
            .await
    }

    async fn persist(
        &self,
        owner_id: Uuid,
        stored: &StoredObject,
        styles: [&Recipe; 2],
        orientation: Orientation,
        composite: CompositeImage,
        correlation_id: CorrelationId,
    ) -> Result<Asset, PipelineError> {
        let ctx = &self.ctx;
        let (width, height) = (composite.width, composite.height);
        let uploaded = ctx
            .storage
            .upload(
                owner_id,
                &format!("clash-{}.jpg", correlation_id),
                composite.content_type(),
                composite.data.to_vec(),
            )
            .await?;

        let input = NewAsset::new(owner_id, stored.public_id.clone())
            .with_media_kind(MediaKind::Image)
            .with_metadata(json!({
                "correlation_id": correlation_id,
                "composite_of": [styles[0].id(), styles[1].id()],
                "orientation": orientation,
                "width": width,
                "height": height,
            }));

        let mut asset = Asset::create(input, ctx.next_id(), ctx.now())?;
        asset.begin_processing(ctx.now())?;
        asset.complete(uploaded.url, ctx.now())?;
        let asset = ctx.insert(&asset).await?;

        tracing::info!(
            correlation_id = %correlation_id,
            asset_id = %asset.id,
            width,
            height,
            "Composite persisted"
        );
        Ok(asset)
    }
}

/// Invoke one style and download its output.
///
/// Logs its own outcome, since nobody awaits a branch whose sibling already
/// failed the clash.
async fn render(
    ctx: PipelineContext,
    source_url: String,
    style: Recipe,
    correlation_id: CorrelationId,
) -> Result<Bytes, PipelineError> {
    let request = InvocationRequest::for_recipe(source_url, &style, correlation_id);
    let result = match ctx.generator.invoke(&request).await {
        Ok(success) => {
            ctx.generator
                .fetch_output(&success.output_url, correlation_id)
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(image) => {
            tracing::debug!(
                correlation_id = %correlation_id,
                recipe_id = %style.id(),
                size_bytes = image.len(),
                "Clash branch finished"
            );
            Ok(image)
        }
        Err(err) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                recipe_id = %style.id(),
                error_kind = %err.kind(),
                attempts = err.attempts(),
                error = %err,
                "Clash branch failed"
            );
            Err(PipelineError::invocation(style.id(), err))
        }
    }
}

async fn join_branch(
    handle: JoinHandle<Result<Bytes, PipelineError>>,
) -> Result<Bytes, PipelineError> {
    handle
        .await
        .map_err(|e| PipelineError::Task(format!("Clash branch task failed: {}", e)))?
}

async fn compose(
    a: Bytes,
    b: Bytes,
    orientation: Orientation,
) -> Result<CompositeImage, PipelineError> {
    tokio::task::spawn_blocking(move || compose_bytes(&a, &b, orientation))
        .await
        .map_err(|e| PipelineError::Task(format!("Composition task failed: {}", e)))?
        .map_err(PipelineError::from)
}

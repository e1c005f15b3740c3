//! MoodMorph: one source, several recipes, independent outcomes.
//!
//! The source is uploaded once and every recipe runs as its own branch under
//! a shared correlation id. All branches are awaited to completion; a failing
//! branch never cancels its siblings. Each successful branch is persisted as
//! soon as it finishes. The run only fails when no branch succeeds.

use futures::future::join_all;
use morphfeed_core::models::{Asset, GenerationRun, NewAsset, Recipe};
use morphfeed_core::{AssetError, CorrelationId};
use morphfeed_generation::InvocationRequest;
use morphfeed_storage::StoredObject;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::{AggregateFailure, BranchFailure, PipelineError};
use crate::source::{CleanupGuard, SourceFile, SourceProvider};

/// Outcome of a run with at least one successful branch.
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    pub correlation_id: CorrelationId,
    pub succeeded: Vec<Asset>,
    pub failed: Vec<BranchFailure>,
    /// One record per branch, keyed by recipe id
    pub runs: Vec<GenerationRun>,
}

impl VariantReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

struct BranchOutcome {
    run: GenerationRun,
    result: Result<Asset, BranchFailure>,
}

#[derive(Clone)]
pub struct VariantOrchestrator {
    ctx: PipelineContext,
}

impl VariantOrchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        owner_id: Uuid,
        source: &dyn SourceProvider,
        recipes: &[Recipe],
    ) -> Result<VariantReport, PipelineError> {
        let guard = CleanupGuard::new(source);
        validate_recipes(recipes)?;

        let file = guard
            .provider()
            .resolve()
            .await
            .map_err(|e| PipelineError::Source(format!("{:#}", e)))?;

        let correlation_id = self.ctx.new_correlation_id();
        let span = tracing::info_span!(
            "moodmorph",
            correlation_id = %correlation_id,
            branches = recipes.len()
        );

        let report = self
            .fan_out(owner_id, &file, recipes, correlation_id)
            .instrument(span)
            .await;
        guard.release();
        report
    }

    async fn fan_out(
        &self,
        owner_id: Uuid,
        file: &SourceFile,
        recipes: &[Recipe],
        correlation_id: CorrelationId,
    ) -> Result<VariantReport, PipelineError> {
        let stored = self
            .ctx
            .upload_source(owner_id, file, correlation_id)
            .await?;

        let branches = recipes
            .iter()
            .map(|recipe| self.run_branch(owner_id, file, &stored, recipe, correlation_id));
        let outcomes = join_all(branches).await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut runs = Vec::new();
        for outcome in outcomes {
            runs.push(outcome.run);
            match outcome.result {
                Ok(asset) => succeeded.push(asset),
                Err(failure) => failed.push(failure),
            }
        }

        if succeeded.is_empty() {
            let aggregate = AggregateFailure {
                correlation_id,
                failures: failed,
            };
            tracing::warn!(
                correlation_id = %correlation_id,
                error_kinds = ?aggregate.kinds(),
                "Every branch failed"
            );
            return Err(aggregate.into());
        }

        tracing::info!(
            correlation_id = %correlation_id,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "Run finished"
        );

        Ok(VariantReport {
            correlation_id,
            succeeded,
            failed,
            runs,
        })
    }

    async fn run_branch(
        &self,
        owner_id: Uuid,
        file: &SourceFile,
        stored: &StoredObject,
        recipe: &Recipe,
        correlation_id: CorrelationId,
    ) -> BranchOutcome {
        let recipe_id = recipe.id().to_string();
        let request = InvocationRequest::for_recipe(&stored.url, recipe, correlation_id);

        let success = match self.ctx.generator.invoke(&request).await {
            Ok(success) => success,
            Err(err) => {
                let attempts = err.attempts();
                let run = GenerationRun::failed(
                    correlation_id,
                    &recipe_id,
                    attempts,
                    err.kind(),
                    err.to_string(),
                );
                return BranchOutcome {
                    result: Err(BranchFailure {
                        recipe_id,
                        kind: err.kind(),
                        message: err.to_string(),
                        attempts,
                    }),
                    run,
                };
            }
        };

        let run = GenerationRun::succeeded(
            correlation_id,
            &recipe_id,
            success.attempts,
            &success.output_url,
        );

        let result = self
            .persist_variant(owner_id, file, stored, recipe, correlation_id, &success.output_url)
            .await
            .map_err(|err| {
                tracing::error!(
                    correlation_id = %correlation_id,
                    recipe_id = %recipe_id,
                    error = %err,
                    "Failed to persist variant"
                );
                BranchFailure {
                    recipe_id: recipe_id.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                    attempts: success.attempts,
                }
            });

        BranchOutcome { run, result }
    }

    async fn persist_variant(
        &self,
        owner_id: Uuid,
        file: &SourceFile,
        stored: &StoredObject,
        recipe: &Recipe,
        correlation_id: CorrelationId,
        output_url: &str,
    ) -> Result<Asset, PipelineError> {
        let ctx = &self.ctx;
        let input = NewAsset::new(owner_id, stored.public_id.clone())
            .with_media_kind(file.media_kind())
            .with_recipe(recipe.to_ref())
            .with_metadata(json!({
                "correlation_id": correlation_id,
                "recipe_kind": recipe.kind_name(),
            }));

        let mut asset = Asset::create(input, ctx.next_id(), ctx.now())?;
        asset.begin_processing(ctx.now())?;
        asset.complete(output_url, ctx.now())?;
        let asset = ctx.insert(&asset).await?;

        tracing::info!(
            correlation_id = %correlation_id,
            recipe_id = %recipe.id(),
            asset_id = %asset.id,
            "Variant persisted"
        );
        Ok(asset)
    }
}

fn validate_recipes(recipes: &[Recipe]) -> Result<(), AssetError> {
    if recipes.is_empty() {
        return Err(AssetError::Validation(
            "at least one recipe is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for recipe in recipes {
        recipe.validate()?;
        if !seen.insert(recipe.id()) {
            return Err(AssetError::Validation(format!(
                "recipe '{}' appears more than once",
                recipe.id()
            )));
        }
    }
    Ok(())
}

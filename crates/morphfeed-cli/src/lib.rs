//! Wiring shared by the `morphfeed` binary.

use anyhow::{Context, Result};
use morphfeed_core::models::{catalog, Recipe};
use morphfeed_core::Config;
use morphfeed_db::{setup_database, AssetRepository, InMemoryAssetRepository, PgAssetRepository};
use morphfeed_generation::InvocationClient;
use morphfeed_services::PipelineContext;
use morphfeed_storage::create_storage;
use std::sync::Arc;

/// Build the pipeline collaborators from configuration.
///
/// Postgres is used when `DATABASE_URL` is set, otherwise assets only live
/// for the duration of the command.
pub async fn build_context(config: &Config) -> Result<PipelineContext> {
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;

    let repository: Arc<dyn AssetRepository> = match &config.database_url {
        Some(url) => {
            let pool = setup_database(url, config.db_max_connections).await?;
            Arc::new(PgAssetRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; assets are kept in memory");
            Arc::new(InMemoryAssetRepository::new())
        }
    };

    let generator = InvocationClient::from_settings(&config.generation)
        .context("Failed to create generation client")?;

    Ok(PipelineContext::new(storage, repository, Arc::new(generator)))
}

fn find(recipes: Vec<Recipe>, id: &str, kind: &str) -> Result<Recipe> {
    let known: Vec<String> = recipes.iter().map(|r| r.id().to_string()).collect();
    recipes
        .into_iter()
        .find(|r| r.id() == id)
        .with_context(|| format!("Unknown {} '{}' (known: {})", kind, id, known.join(", ")))
}

pub fn find_preset(id: &str) -> Result<Recipe> {
    find(catalog::presets(), id, "preset")
}

pub fn find_style(id: &str) -> Result<Recipe> {
    find(catalog::styles(), id, "style")
}

/// Moods by id; an empty selection means every built-in mood.
pub fn select_moods(ids: &[String]) -> Result<Vec<Recipe>> {
    if ids.is_empty() {
        return Ok(catalog::moods());
    }
    ids.iter()
        .map(|id| find(catalog::moods(), id, "mood"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_moods_defaults_to_catalog() {
        let moods = select_moods(&[]).unwrap();
        assert_eq!(moods.len(), 3);
    }

    #[test]
    fn test_select_moods_by_id() {
        let moods = select_moods(&["electric".to_string()]).unwrap();
        assert_eq!(moods.len(), 1);
        assert_eq!(moods[0].id(), "electric");
    }

    #[test]
    fn test_unknown_recipe_lists_known_ids() {
        let err = find_style("baroque").unwrap_err().to_string();
        assert!(err.contains("baroque"));
        assert!(err.contains("anime"));
        assert!(find_preset("polaroid").is_ok());
    }
}

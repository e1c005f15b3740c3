use anyhow::{Context, Result};
use async_trait::async_trait;
use morphfeed_core::models::{Asset, AssetStatus, MediaKind, RecipeRef, Visibility};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

/// Upper bound for a single feed page
pub const MAX_FEED_LIMIT: i64 = 100;

const ASSET_COLUMNS: &str = "id, owner_id, source_ref, media_kind, preset_key, freeform_prompt, \
     lineage_id, status, is_public, allow_remix, published_at, failure_reason, metadata, \
     created_at, updated_at";

/// Persistence collaborator for assets.
///
/// Implementations must tolerate concurrent writes to distinct assets; the
/// orchestrators persist one asset per branch without any cross-branch lock.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Insert a new asset. Creating an id that already exists returns the
    /// stored asset unchanged.
    async fn create_asset(&self, asset: &Asset) -> Result<Asset>;

    /// Overwrite the mutable fields of an existing asset.
    async fn update_asset(&self, asset: &Asset) -> Result<Asset>;

    async fn get_asset(&self, id: Uuid) -> Result<Option<Asset>>;

    /// Public, ready assets, newest publication first.
    async fn list_feed(&self, limit: i64) -> Result<Vec<Asset>>;
}

pub(crate) fn clamp_feed_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_FEED_LIMIT)
}

/// Postgres-backed asset repository
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "insert", db.record_id = %asset.id))]
    async fn create_asset(&self, asset: &Asset) -> Result<Asset> {
        let query = format!(
            r#"
            INSERT INTO assets ({ASSET_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO NOTHING
            RETURNING {ASSET_COLUMNS}
            "#
        );

        let inserted = sqlx::query::<Postgres>(&query)
            .bind(asset.id)
            .bind(asset.owner_id)
            .bind(&asset.source_ref)
            .bind(asset.media_kind.to_string())
            .bind(asset.recipe.preset_key.as_deref())
            .bind(asset.recipe.freeform_prompt.as_deref())
            .bind(asset.lineage)
            .bind(asset.status.to_string())
            .bind(asset.visibility.is_public)
            .bind(asset.visibility.allow_remix)
            .bind(asset.published_at)
            .bind(asset.failure_reason.as_deref())
            .bind(&asset.metadata)
            .bind(asset.created_at)
            .bind(asset.updated_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to insert asset")?;

        match inserted {
            Some(row) => asset_from_row(&row),
            None => {
                tracing::debug!(asset_id = %asset.id, "Asset already exists, returning stored row");
                self.get_asset(asset.id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("Asset {} vanished after conflict", asset.id))
            }
        }
    }

    #[tracing::instrument(skip(self, asset), fields(db.table = "assets", db.operation = "update", db.record_id = %asset.id))]
    async fn update_asset(&self, asset: &Asset) -> Result<Asset> {
        let query = format!(
            r#"
            UPDATE assets
            SET source_ref = $2,
                status = $3,
                is_public = $4,
                allow_remix = $5,
                published_at = COALESCE(published_at, $6),
                failure_reason = $7,
                metadata = $8,
                updated_at = $9
            WHERE id = $1
            RETURNING {ASSET_COLUMNS}
            "#
        );

        let row = sqlx::query::<Postgres>(&query)
            .bind(asset.id)
            .bind(&asset.source_ref)
            .bind(asset.status.to_string())
            .bind(asset.visibility.is_public)
            .bind(asset.visibility.allow_remix)
            .bind(asset.published_at)
            .bind(asset.failure_reason.as_deref())
            .bind(&asset.metadata)
            .bind(asset.updated_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update asset")?
            .ok_or_else(|| anyhow::anyhow!("Asset {} not found", asset.id))?;

        asset_from_row(&row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select", db.record_id = %id))]
    async fn get_asset(&self, id: Uuid) -> Result<Option<Asset>> {
        let query = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1");

        let row = sqlx::query::<Postgres>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load asset")?;

        row.as_ref().map(asset_from_row).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn list_feed(&self, limit: i64) -> Result<Vec<Asset>> {
        let query = format!(
            r#"
            SELECT {ASSET_COLUMNS} FROM assets
            WHERE is_public AND status = 'ready'
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT $1
            "#
        );

        let rows = sqlx::query::<Postgres>(&query)
            .bind(clamp_feed_limit(limit))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list feed")?;

        rows.iter().map(asset_from_row).collect()
    }
}

fn asset_from_row(row: &PgRow) -> Result<Asset> {
    let status: String = row.try_get("status")?;
    let media_kind: Option<String> = row.try_get("media_kind")?;

    Ok(Asset {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        source_ref: row.try_get("source_ref")?,
        media_kind: MediaKind::parse(media_kind.as_deref()),
        recipe: RecipeRef {
            preset_key: row.try_get("preset_key")?,
            freeform_prompt: row.try_get("freeform_prompt")?,
        },
        lineage: row.try_get("lineage_id")?,
        status: status.parse::<AssetStatus>()?,
        visibility: Visibility {
            is_public: row.try_get("is_public")?,
            allow_remix: row.try_get("allow_remix")?,
        },
        published_at: row.try_get("published_at")?,
        failure_reason: row.try_get("failure_reason")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

//! Asset model and lifecycle
//!
//! An asset moves `queued -> processing -> ready | failed`. Publishing is an
//! orthogonal transition that only touches visibility and is only legal once
//! the asset is `ready`. Every transition validates first and mutates second,
//! so a rejected call leaves the asset untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AssetError;

/// Kind of media an asset holds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    /// Lenient parse: anything other than `video` (including nothing) is an image.
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse::<MediaKind>().ok())
            .unwrap_or_default()
    }

    /// Derive the kind from a MIME type.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.trim().to_lowercase().starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(anyhow::anyhow!("Invalid media kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Queued,
    Processing,
    Ready,
    Failed,
}

impl AssetStatus {
    /// `ready` and `failed` end the generation phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Ready | AssetStatus::Failed)
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Queued => write!(f, "queued"),
            AssetStatus::Processing => write!(f, "processing"),
            AssetStatus::Ready => write!(f, "ready"),
            AssetStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for AssetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(AssetStatus::Queued),
            "processing" => Ok(AssetStatus::Processing),
            "ready" => Ok(AssetStatus::Ready),
            "failed" => Ok(AssetStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid asset status: {}", s)),
        }
    }
}

/// Feed visibility flags. Both default to false.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub is_public: bool,
    pub allow_remix: bool,
}

/// What the asset was generated from. Both fields may be empty for a raw passthrough.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRef {
    pub preset_key: Option<String>,
    pub freeform_prompt: Option<String>,
}

/// Input for [`Asset::create`].
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub owner_id: Uuid,
    pub source_ref: Option<String>,
    pub media_kind: Option<String>,
    pub recipe: RecipeRef,
    pub lineage: Option<Uuid>,
    pub metadata: JsonValue,
}

impl NewAsset {
    pub fn new(owner_id: Uuid, source_ref: impl Into<String>) -> Self {
        Self {
            owner_id,
            source_ref: Some(source_ref.into()),
            media_kind: None,
            recipe: RecipeRef::default(),
            lineage: None,
            metadata: JsonValue::Object(Default::default()),
        }
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind.to_string());
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeRef) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn with_lineage(mut self, parent: Uuid) -> Self {
        self.lineage = Some(parent);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One submitted unit of work, from submission to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Storage reference of the input media; replaced by the output once ready.
    pub source_ref: String,
    pub media_kind: MediaKind,
    pub recipe: RecipeRef,
    pub lineage: Option<Uuid>,
    pub status: AssetStatus,
    pub visibility: Visibility,
    pub published_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Create a new asset in `queued`.
    ///
    /// Lineage is only accepted here, before the asset exists, which keeps the
    /// remix graph a forest.
    pub fn create(input: NewAsset, id: Uuid, now: DateTime<Utc>) -> Result<Self, AssetError> {
        let source_ref = input
            .source_ref
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AssetError::Validation("a source reference is required".to_string())
            })?;

        if input.lineage == Some(id) {
            return Err(AssetError::Validation(
                "an asset cannot derive from itself".to_string(),
            ));
        }

        let metadata = match input.metadata {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other,
        };

        Ok(Self {
            id,
            owner_id: input.owner_id,
            source_ref,
            media_kind: MediaKind::parse(input.media_kind.as_deref()),
            recipe: input.recipe,
            lineage: input.lineage,
            status: AssetStatus::Queued,
            visibility: Visibility::default(),
            published_at: None,
            failure_reason: None,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// `queued -> processing`. Rejects any other starting state so the same
    /// asset is never processed twice concurrently.
    pub fn begin_processing(&mut self, now: DateTime<Utc>) -> Result<(), AssetError> {
        self.expect_status(AssetStatus::Queued, AssetStatus::Processing)?;
        self.status = AssetStatus::Processing;
        self.updated_at = now;
        Ok(())
    }

    /// `processing -> ready`, pointing the asset at the generated output.
    pub fn complete(
        &mut self,
        output_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AssetError> {
        self.expect_status(AssetStatus::Processing, AssetStatus::Ready)?;
        let output_ref = output_ref.into();
        if output_ref.trim().is_empty() {
            return Err(AssetError::Validation(
                "an output reference is required to complete an asset".to_string(),
            ));
        }
        self.source_ref = output_ref;
        self.status = AssetStatus::Ready;
        self.updated_at = now;
        Ok(())
    }

    /// `processing -> failed`. No output pointer is set.
    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), AssetError> {
        self.expect_status(AssetStatus::Processing, AssetStatus::Failed)?;
        self.status = AssetStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = now;
        Ok(())
    }

    /// Set visibility flags. Only legal on `ready` assets.
    ///
    /// `published_at` is stamped the first time the asset becomes public and
    /// is never moved afterwards.
    pub fn publish(&mut self, visibility: Visibility, now: DateTime<Utc>) -> Result<(), AssetError> {
        if self.status != AssetStatus::Ready {
            return Err(AssetError::NotReady {
                asset_id: self.id,
                status: self.status,
            });
        }
        self.visibility = visibility;
        if visibility.is_public && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn is_remixable(&self) -> bool {
        self.status == AssetStatus::Ready && self.visibility.allow_remix
    }

    fn expect_status(&self, expected: AssetStatus, to: AssetStatus) -> Result<(), AssetError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(AssetError::IllegalTransition {
                asset_id: self.id,
                from: self.status,
                to,
            })
        }
    }
}

//! Generation recipes
//!
//! A recipe is a named bundle of prompt, negative prompt, strength and seed.
//! Moods drive the multi-variant fan-out, styles drive the dual-style clash and
//! presets drive single generations. All three share [`RecipeSpec`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::AssetError;
use crate::models::asset::RecipeRef;

/// Shared structural contract of every recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSpec {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
    /// How far the output may drift from the source, in `[0, 1]`.
    pub strength: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl RecipeSpec {
    pub fn new(prompt: impl Into<String>, strength: f32) -> Self {
        Self {
            prompt: prompt.into(),
            negative: None,
            strength,
            seed: None,
        }
    }

    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        self.negative = Some(negative.into());
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recipe {
    Mood { id: String, spec: RecipeSpec },
    Style { id: String, spec: RecipeSpec },
    Preset { id: String, spec: RecipeSpec },
}

impl Recipe {
    pub fn mood(id: impl Into<String>, spec: RecipeSpec) -> Self {
        Recipe::Mood { id: id.into(), spec }
    }

    pub fn style(id: impl Into<String>, spec: RecipeSpec) -> Self {
        Recipe::Style { id: id.into(), spec }
    }

    pub fn preset(id: impl Into<String>, spec: RecipeSpec) -> Self {
        Recipe::Preset { id: id.into(), spec }
    }

    pub fn id(&self) -> &str {
        match self {
            Recipe::Mood { id, .. } | Recipe::Style { id, .. } | Recipe::Preset { id, .. } => id,
        }
    }

    pub fn spec(&self) -> &RecipeSpec {
        match self {
            Recipe::Mood { spec, .. } | Recipe::Style { spec, .. } | Recipe::Preset { spec, .. } => {
                spec
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Recipe::Mood { .. } => "mood",
            Recipe::Style { .. } => "style",
            Recipe::Preset { .. } => "preset",
        }
    }

    /// Check the recipe before any network call is made.
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.id().trim().is_empty() {
            return Err(AssetError::Validation("recipe id must not be empty".to_string()));
        }
        let spec = self.spec();
        if spec.prompt.trim().is_empty() {
            return Err(AssetError::Validation(format!(
                "recipe '{}' has an empty prompt",
                self.id()
            )));
        }
        if !spec.strength.is_finite() || !(0.0..=1.0).contains(&spec.strength) {
            return Err(AssetError::Validation(format!(
                "recipe '{}' strength {} is outside [0, 1]",
                self.id(),
                spec.strength
            )));
        }
        Ok(())
    }

    /// The reference stored on an asset generated from this recipe.
    pub fn to_ref(&self) -> RecipeRef {
        RecipeRef {
            preset_key: Some(self.id().to_string()),
            freeform_prompt: Some(self.spec().prompt.clone()),
        }
    }
}

impl Display for Recipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind_name(), self.id())
    }
}

/// Built-in recipes used when the caller does not supply its own.
pub mod catalog {
    use super::{Recipe, RecipeSpec};

    const DEFAULT_NEGATIVE: &str = "blurry, low quality, distorted, watermark, text";

    /// The three moods of a MoodMorph run.
    pub fn moods() -> Vec<Recipe> {
        vec![
            Recipe::mood(
                "serene",
                RecipeSpec::new(
                    "calm and serene atmosphere, soft pastel light, gentle haze",
                    0.55,
                )
                .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::mood(
                "electric",
                RecipeSpec::new(
                    "electric neon energy, vivid saturated colors, high contrast",
                    0.65,
                )
                .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::mood(
                "melancholy",
                RecipeSpec::new(
                    "melancholic mood, muted blue tones, overcast light, film grain",
                    0.6,
                )
                .with_negative(DEFAULT_NEGATIVE),
            ),
        ]
    }

    pub fn styles() -> Vec<Recipe> {
        vec![
            Recipe::style(
                "anime",
                RecipeSpec::new("anime illustration, clean line art, cel shading", 0.7)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::style(
                "oil_painting",
                RecipeSpec::new("classical oil painting, visible brush strokes, rich texture", 0.7)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::style(
                "cyberpunk",
                RecipeSpec::new("cyberpunk city aesthetic, neon rim light, rain reflections", 0.75)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::style(
                "watercolor",
                RecipeSpec::new("loose watercolor painting, bleeding pigments, paper texture", 0.65)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
        ]
    }

    pub fn presets() -> Vec<Recipe> {
        vec![
            Recipe::preset(
                "polaroid",
                RecipeSpec::new("vintage instant photo, faded colors, light leaks", 0.45)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::preset(
                "claymation",
                RecipeSpec::new("claymation stop-motion figure, handmade plasticine look", 0.7)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
            Recipe::preset(
                "sketch",
                RecipeSpec::new("pencil sketch, cross hatching, graphite on paper", 0.6)
                    .with_negative(DEFAULT_NEGATIVE),
            ),
        ]
    }

    pub fn find_style(id: &str) -> Option<Recipe> {
        styles().into_iter().find(|r| r.id() == id)
    }

    pub fn find_preset(id: &str) -> Option<Recipe> {
        presets().into_iter().find(|r| r.id() == id)
    }
}

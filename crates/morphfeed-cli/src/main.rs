//! Morphfeed CLI: run generations against local files.
//!
//! Configuration comes from the environment (see `.env`). Set
//! GENERATION_ENDPOINT_URL at minimum; DATABASE_URL enables Postgres.

use anyhow::Context;
use clap::{Parser, Subcommand};
use morphfeed_cli::{build_context, find_preset, find_style, select_moods};
use morphfeed_core::models::{catalog, Visibility};
use morphfeed_core::{Config, ErrorMetadata};
use morphfeed_infra::{init_telemetry, LogFormat};
use morphfeed_processing::Orientation;
use morphfeed_services::{
    GenerationService, PairCompositor, PathSource, PipelineError, PublishService,
    VariantOrchestrator,
};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "morphfeed", about = "Morphfeed asset generation CLI")]
struct Cli {
    /// Owner of the generated assets (random when omitted)
    #[arg(long, global = true, env = "MORPHFEED_OWNER_ID")]
    owner: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one asset with a preset
    Generate {
        /// Path to the source image or video
        source: PathBuf,
        /// Preset id (see `recipes`)
        #[arg(long)]
        preset: String,
    },
    /// Remix a published asset with a preset
    Remix {
        /// Parent asset UUID
        parent: Uuid,
        #[arg(long)]
        preset: String,
    },
    /// Run several moods against one source
    Moodmorph {
        source: PathBuf,
        /// Mood ids, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        moods: Vec<String>,
    },
    /// Render two styles and merge them into one image
    Clash {
        source: PathBuf,
        #[arg(long)]
        style_a: String,
        #[arg(long)]
        style_b: String,
        /// vertical (left/right) or horizontal (top/bottom)
        #[arg(long, default_value = "vertical")]
        orientation: Orientation,
    },
    /// Publish a ready asset
    Publish {
        id: Uuid,
        /// Show the asset in the public feed
        #[arg(long)]
        public: bool,
        /// Allow other users to remix the asset
        #[arg(long)]
        allow_remix: bool,
    },
    /// List the public feed
    Feed {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// List built-in recipes
    Recipes,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn report_failure(err: PipelineError) -> anyhow::Error {
    match err.log_level() {
        morphfeed_core::LogLevel::Debug => tracing::debug!(error_code = err.error_code(), "{}", err),
        morphfeed_core::LogLevel::Warn => tracing::warn!(error_code = err.error_code(), "{}", err),
        morphfeed_core::LogLevel::Error => tracing::error!(error_code = err.error_code(), "{}", err),
    }
    if let PipelineError::Aggregate(aggregate) = &err {
        if let Err(e) = print_json(&aggregate.failures) {
            tracing::error!(error = %e, "Failed to print branch failures");
        }
    }
    anyhow::Error::new(err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("morphfeed-cli", LogFormat::from_env())?;
    let cli = Cli::parse();

    if let Commands::Recipes = cli.command {
        let listing: Vec<_> = catalog::moods()
            .into_iter()
            .chain(catalog::styles())
            .chain(catalog::presets())
            .map(|r| {
                serde_json::json!({
                    "kind": r.kind_name(),
                    "id": r.id(),
                    "prompt": r.spec().prompt,
                    "strength": r.spec().strength,
                })
            })
            .collect();
        return print_json(&listing);
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    let ctx = build_context(&config).await?;
    let owner = cli.owner.unwrap_or_else(Uuid::new_v4);

    match cli.command {
        Commands::Generate { source, preset } => {
            let recipe = find_preset(&preset)?;
            let asset = GenerationService::new(ctx)
                .generate(owner, &PathSource::new(source), &recipe)
                .await
                .map_err(report_failure)?;
            print_json(&asset)?;
        }
        Commands::Remix { parent, preset } => {
            let recipe = find_preset(&preset)?;
            let asset = GenerationService::new(ctx)
                .remix(owner, parent, &recipe)
                .await
                .map_err(report_failure)?;
            print_json(&asset)?;
        }
        Commands::Moodmorph { source, moods } => {
            let recipes = select_moods(&moods)?;
            let report = VariantOrchestrator::new(ctx)
                .run(owner, &PathSource::new(source), &recipes)
                .await
                .map_err(report_failure)?;
            print_json(&report)?;
        }
        Commands::Clash {
            source,
            style_a,
            style_b,
            orientation,
        } => {
            let a = find_style(&style_a)?;
            let b = find_style(&style_b)?;
            let asset = PairCompositor::new(ctx)
                .run(owner, &PathSource::new(source), &a, &b, orientation)
                .await
                .map_err(report_failure)?;
            print_json(&asset)?;
        }
        Commands::Publish {
            id,
            public,
            allow_remix,
        } => {
            let visibility = Visibility {
                is_public: public,
                allow_remix,
            };
            let asset = PublishService::new(ctx)
                .publish(id, visibility)
                .await
                .map_err(report_failure)?;
            print_json(&asset)?;
        }
        Commands::Feed { limit } => {
            let feed = PublishService::new(ctx)
                .feed(limit)
                .await
                .map_err(report_failure)?;
            print_json(&feed)?;
        }
        Commands::Recipes => {}
    }

    Ok(())
}

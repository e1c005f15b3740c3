//! Pipeline error types
//!
//! Branch-local failures in a fan-out are captured as [`BranchFailure`]
//! records. Only when no branch succeeds are they consolidated into an
//! [`AggregateFailure`] and raised.

use morphfeed_core::{AssetError, CorrelationId, ErrorMetadata, FailureKind, LogLevel};
use morphfeed_generation::InvocationError;
use morphfeed_processing::CompositionError;
use morphfeed_storage::StorageError;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Why one branch of a run did not produce an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub recipe_id: String,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Raised when every branch of a fan-out failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateFailure {
    pub correlation_id: CorrelationId,
    pub failures: Vec<BranchFailure>,
}

impl AggregateFailure {
    /// Distinct error kinds observed across branches, in branch order.
    pub fn kinds(&self) -> Vec<FailureKind> {
        let mut kinds = Vec::new();
        for failure in &self.failures {
            if !kinds.contains(&failure.kind) {
                kinds.push(failure.kind);
            }
        }
        kinds
    }
}

impl Display for AggregateFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "all {} branch(es) of run {} failed",
            self.failures.len(),
            self.correlation_id
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(
                f,
                "{}{} ({}, {} attempt(s))",
                sep, failure.recipe_id, failure.kind, failure.attempts
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Source could not be resolved: {0}")]
    Source(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation failed for recipe '{recipe_id}': {source}")]
    Invocation {
        recipe_id: String,
        #[source]
        source: InvocationError,
    },

    #[error("Composition failed: {0}")]
    Composition(#[from] CompositionError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    #[error("Asset {0} not found")]
    NotFound(Uuid),

    #[error("Asset {0} cannot be remixed")]
    RemixNotAllowed(Uuid),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn invocation(recipe_id: impl Into<String>, source: InvocationError) -> Self {
        PipelineError::Invocation {
            recipe_id: recipe_id.into(),
            source,
        }
    }

    pub(crate) fn persistence(err: anyhow::Error) -> Self {
        PipelineError::Persistence(format!("{:#}", err))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Asset(e) => e.kind(),
            PipelineError::Source(_) => FailureKind::Source,
            PipelineError::Storage(_) => FailureKind::Storage,
            PipelineError::Invocation { source, .. } => source.kind(),
            PipelineError::Composition(_) => FailureKind::Composition,
            PipelineError::Persistence(_) | PipelineError::Task(_) => FailureKind::Persistence,
            PipelineError::Aggregate(_) => FailureKind::Aggregate,
            PipelineError::NotFound(_) | PipelineError::RemixNotAllowed(_) => {
                FailureKind::Validation
            }
        }
    }

    /// Attempts made by the generation call behind this error, if any.
    pub fn attempts(&self) -> u32 {
        match self {
            PipelineError::Invocation { source, .. } => source.attempts(),
            _ => 0,
        }
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Asset(e) => e.error_code(),
            PipelineError::Source(_) => "SOURCE_UNAVAILABLE",
            PipelineError::Storage(_) => "STORAGE_ERROR",
            PipelineError::Invocation { source, .. } => source.error_code(),
            PipelineError::Composition(e) => e.error_code(),
            PipelineError::Persistence(_) => "PERSISTENCE_ERROR",
            PipelineError::Aggregate(_) => "ALL_BRANCHES_FAILED",
            PipelineError::NotFound(_) => "NOT_FOUND",
            PipelineError::RemixNotAllowed(_) => "REMIX_NOT_ALLOWED",
            PipelineError::Task(_) => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::Invocation { source, .. } => source.is_recoverable(),
            PipelineError::Aggregate(agg) => agg.failures.iter().any(|f| f.kind.is_transient()),
            PipelineError::Storage(_) | PipelineError::Persistence(_) => true,
            _ => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::Asset(e) => e.log_level(),
            PipelineError::Invocation { source, .. } => source.log_level(),
            PipelineError::NotFound(_) | PipelineError::RemixNotAllowed(_) => LogLevel::Debug,
            PipelineError::Aggregate(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    fn client_message(&self) -> String {
        match self {
            PipelineError::Asset(e) => e.client_message(),
            PipelineError::Invocation { source, .. } => source.client_message(),
            PipelineError::Composition(e) => e.client_message(),
            PipelineError::Aggregate(agg) => format!(
                "None of the {} variations could be generated",
                agg.failures.len()
            ),
            PipelineError::NotFound(_) => "Asset not found".to_string(),
            PipelineError::RemixNotAllowed(_) => "This asset cannot be remixed".to_string(),
            PipelineError::Source(_) => "The selected file could not be read".to_string(),
            _ => "Something went wrong, please try again".to_string(),
        }
    }
}

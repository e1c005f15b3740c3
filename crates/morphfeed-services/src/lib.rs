//! Morphfeed Services
//!
//! Orchestration on top of storage, persistence and the generation client:
//! single generations and remixes, the MoodMorph fan-out, the StyleClash
//! composite and publishing.

pub mod clash;
pub mod context;
pub mod error;
pub mod generation;
pub mod moodmorph;
pub mod publish;
pub mod source;

#[cfg(test)]
mod test_helpers;

pub use clash::PairCompositor;
pub use context::PipelineContext;
pub use error::{AggregateFailure, BranchFailure, PipelineError};
pub use generation::GenerationService;
pub use moodmorph::{VariantOrchestrator, VariantReport};
pub use publish::PublishService;
pub use source::{BufferedSource, CleanupGuard, PathSource, SourceFile, SourceProvider};

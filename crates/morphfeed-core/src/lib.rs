//! Morphfeed Core Library
//!
//! This crate provides the domain models, the asset lifecycle state machine,
//! error types and configuration shared by every Morphfeed component.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, GenerationSettings, StorageSettings};
pub use error::{AssetError, ErrorMetadata, FailureKind, LogLevel};
pub use ids::{CorrelationId, IdGenerator, UuidGenerator};
pub use storage_types::StorageBackend;

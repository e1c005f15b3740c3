//! Asset persistence
//!
//! The pipeline treats persistence as a fallible collaborator reached through
//! [`AssetRepository`]. Writes are idempotent by asset id: creating an asset
//! that already exists returns the stored row, and `published_at` is never
//! moved once set.

pub mod assets;
pub mod memory;
pub mod setup;

pub use assets::{AssetRepository, PgAssetRepository};
pub use memory::InMemoryAssetRepository;
pub use setup::setup_database;

//! Morphfeed Storage Library
//!
//! Object-storage collaborator used by the generation pipeline. Every upload
//! yields a [`StoredObject`]: a durable public URL the generation endpoint can
//! fetch, and an opaque `public_id` stored on assets.
//!
//! # Key format
//!
//! `uploads/{owner_id}/{object_id}-{filename}`. Keys must not contain `..` or
//! a leading `/`. Key generation is centralized in the `keys` module so all
//! backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
pub use morphfeed_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};

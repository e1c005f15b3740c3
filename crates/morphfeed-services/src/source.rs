//! Source resolution and scoped cleanup.
//!
//! Callers hand the orchestrators a [`SourceProvider`] instead of relying on
//! any ambient "currently selected file". The provider owns whatever transient
//! handle backs the source and is released exactly once per run through a
//! [`CleanupGuard`], whichever way the run ends.

use anyhow::{Context, Result};
use async_trait::async_trait;
use morphfeed_core::models::MediaKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A concrete binary ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl SourceFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_content_type(&self.content_type)
    }
}

/// Capability that yields the source binary for one run.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn resolve(&self) -> Result<SourceFile>;

    /// Invalidate the transient handle behind the source.
    fn release(&self);
}

/// Releases its provider once when dropped.
pub struct CleanupGuard<'a> {
    provider: &'a dyn SourceProvider,
    released: bool,
}

impl<'a> CleanupGuard<'a> {
    pub fn new(provider: &'a dyn SourceProvider) -> Self {
        Self {
            provider,
            released: false,
        }
    }

    pub fn provider(&self) -> &'a dyn SourceProvider {
        self.provider
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.provider.release();
        }
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.release_once();
    }
}

/// In-memory source, e.g. bytes received from a client.
///
/// Counts releases so callers can verify cleanup ran.
#[derive(Debug)]
pub struct BufferedSource {
    file: Mutex<Option<SourceFile>>,
    releases: AtomicUsize,
}

impl BufferedSource {
    pub fn new(file: SourceFile) -> Self {
        Self {
            file: Mutex::new(Some(file)),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for BufferedSource {
    async fn resolve(&self) -> Result<SourceFile> {
        let file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        file.ok_or_else(|| anyhow::anyhow!("source has already been released"))
    }

    fn release(&self) {
        self.file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Source backed by a file on disk.
#[derive(Debug)]
pub struct PathSource {
    path: Mutex<Option<PathBuf>>,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Mutex::new(Some(path.into())),
        }
    }

    fn current(&self) -> Option<PathBuf> {
        self.path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SourceProvider for PathSource {
    async fn resolve(&self) -> Result<SourceFile> {
        let path = self
            .current()
            .ok_or_else(|| anyhow::anyhow!("source has already been released"))?;

        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read source file {}", path.display()))?;

        let content_type = match morphfeed_processing::inspect(&data) {
            Ok(info) => info.content_type().to_string(),
            Err(_) => content_type_from_extension(&path).to_string(),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());

        Ok(SourceFile {
            filename,
            content_type,
            data,
        })
    }

    fn release(&self) {
        let released = self
            .path
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(path) = released {
            tracing::debug!(path = %path.display(), "Released source file handle");
        }
    }
}

fn content_type_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

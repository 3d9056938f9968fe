//! Shared test utilities.
//!
//! Provides sample sources and recording mocks for every seam the crate
//! exposes: [`BlobStore`], [`Fetcher`], [`AssetMaterializer`] and
//! [`PostProcessor`]. Mocks count their calls so tests can assert how often
//! the network or the host was touched.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fetcher = Arc::new(MockFetcher::returning(b"hello"));
//! let cache = PlaceholderCache::new(
//!     Arc::new(MemoryStore::default()),
//!     fetcher.clone(),
//!     PlaceholderOptions::default(),
//! );
//! cache.get_placeholder(&jpeg_source()).unwrap().await.unwrap();
//! assert_eq!(fetcher.calls(), 1);
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cache::{BlobStore, StoreError};
use crate::descriptor::{AssetMaterializer, CollaboratorError, PostProcessor};
use crate::fetch::{FetchError, Fetcher};
use crate::types::{ImageSource, VariantRequest};

// =========================================================================
// Sample sources
// =========================================================================

pub const JPEG_BASE_URL: &str = "//images.ctfassets.net/space/asset/hash/photo.jpg";

/// 2000×1000 JPEG on the image API host.
pub fn jpeg_source() -> ImageSource {
    ImageSource::new(JPEG_BASE_URL, "image/jpeg")
        .with_file_name("photo.jpg")
        .with_dimensions(2000, 1000)
}

/// A PDF on the image API host: never transformable.
pub fn pdf_source() -> ImageSource {
    ImageSource::new("//images.ctfassets.net/space/asset/hash/doc.pdf", "application/pdf")
        .with_file_name("doc.pdf")
        .with_dimensions(800, 600)
}

// =========================================================================
// MemoryStore
// =========================================================================

/// In-memory [`BlobStore`] counting reads. `read_only()` rejects every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: bool,
    read_delay: Duration,
    gets: AtomicUsize,
}

impl MemoryStore {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Sleep this long inside every read (requires a Tokio runtime).
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::Write {
                path: PathBuf::from(format!("memory/{key}")),
                bytes: value.len(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only store"),
            });
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =========================================================================
// MockFetcher
// =========================================================================

/// Counting [`Fetcher`] returning a fixed payload.
#[derive(Debug, Default)]
pub struct MockFetcher {
    payload: Vec<u8>,
    delay: Duration,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MockFetcher {
    pub fn returning(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    /// Sleep this long inside every fetch (requires a Tokio runtime).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `n` fetches with a 503.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok(self.payload.clone())
    }
}

// =========================================================================
// Host collaborators
// =========================================================================

/// [`AssetMaterializer`] returning `/tmp/<file name>`.
#[derive(Debug, Default)]
pub struct MockMaterializer {
    calls: AtomicUsize,
    fail: bool,
}

impl MockMaterializer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetMaterializer for MockMaterializer {
    async fn materialize(
        &self,
        source: &ImageSource,
        _request: &VariantRequest,
    ) -> Result<PathBuf, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CollaboratorError::new("download failed"));
        }
        let name = source.file_name.as_deref().unwrap_or("asset");
        Ok(Path::new("/tmp").join(name))
    }
}

/// [`PostProcessor`] with canned answers, or failing on everything.
#[derive(Debug, Default)]
pub struct MockPostProcessor {
    svg: Option<String>,
    color: Option<String>,
}

impl MockPostProcessor {
    pub fn returning(svg: &str, color: &str) -> Self {
        Self {
            svg: Some(svg.to_string()),
            color: Some(color.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostProcessor for MockPostProcessor {
    async fn trace_to_vector(&self, _path: &Path) -> Result<String, CollaboratorError> {
        self.svg
            .clone()
            .ok_or_else(|| CollaboratorError::new("potrace failed"))
    }

    async fn dominant_color(&self, _path: &Path) -> Result<String, CollaboratorError> {
        self.color
            .clone()
            .ok_or_else(|| CollaboratorError::new("no pixels"))
    }
}

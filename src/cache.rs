//! Durable blob cache for placeholder payloads.
//!
//! Fetching a low-resolution rendition is a network round trip per image,
//! and a site build may reference thousands of images. This module lets the
//! placeholder cache skip the network when a payload was already fetched by
//! an earlier run.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed by request**: the key is the SHA-1 of
//! the exact placeholder URL ([`hash_url`]). The URL already encodes the
//! asset version and the transformation, so a changed asset or a changed
//! placeholder width produces a new key. Entries never go stale and are
//! never expired.
//!
//! ## Storage
//!
//! [`DiskStore`] writes one file per entry at
//! `<root>/images/<sha1-hex>.base64`, holding the data-URI string verbatim
//! with no wrapper. The directory is created on first write and may be
//! shared between concurrent builds; two writers racing on one key write
//! identical bytes. Each write goes to a hidden `.partial` sibling that is
//! renamed into place, so an interrupted write never leaves a truncated
//! entry behind.
//!
//! ## Write failures
//!
//! [`get_or_compute`] is the one read-through primitive. What happens when
//! the computed value cannot be persisted is a [`PersistPolicy`]:
//!
//! - **`Strict`** (default): the attempt fails and the value is discarded,
//!   so a broken cache directory surfaces immediately.
//! - **`BestEffort`**: the failure is logged and the value is returned.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, warn};

/// Subdirectory of the cache root holding placeholder payloads.
pub const IMAGES_DIR: &str = "images";

/// File extension of a stored payload.
const ENTRY_EXTENSION: &str = "base64";

/// File extension of a payload still being written.
const STAGING_EXTENSION: &str = "partial";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read cache entry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {bytes} bytes to cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        bytes: usize,
        #[source]
        source: io::Error,
    },
}

/// Durable string storage keyed by content hash.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when no entry exists for `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One file per entry under `<root>/images/`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Store rooted at the cache root; entries live in its `images/` child.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join(IMAGES_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// Unique per write; never ends in the entry extension.
    fn staging_path(&self, key: &str) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{key}.{}.{seq}.{STAGING_EXTENSION}", std::process::id()))
    }
}

/// A missing file or a missing directory on the way to it is a miss.
fn is_absent(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path).await {
            Ok(value) => {
                debug!(path = %path.display(), bytes = value.len(), "read cache entry");
                Ok(Some(value))
            }
            Err(err) if is_absent(&err) => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    /// Writes a sibling temp file and renames it into place, so a reader
    /// sees either the whole entry or none.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let write_error = |source| StoreError::Write {
            path: path.clone(),
            bytes: value.len(),
            source,
        };

        fs::create_dir_all(&self.dir).await.map_err(write_error)?;

        let staging = self.staging_path(key);
        let written = match fs::write(&staging, value).await {
            Ok(()) => fs::rename(&staging, &path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(write_error(err));
        }

        debug!(path = %path.display(), bytes = value.len(), "wrote cache entry");
        Ok(())
    }
}

/// SHA-1 of a URL, returned as a lowercase hex string.
pub fn hash_url(url: &str) -> String {
    format!("{:x}", Sha1::digest(url.as_bytes()))
}

/// What [`get_or_compute`] does when the computed value cannot be stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    /// Fail the attempt; the value is discarded.
    #[default]
    Strict,
    /// Log the failure and return the value anyway.
    BestEffort,
}

/// Where a [`Lookup`] value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Stored,
    Computed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub value: String,
    pub origin: Origin,
}

#[derive(Error, Debug)]
pub enum GetOrComputeError<E> {
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Compute(E),
}

/// Read `key` from `store`; on a miss run `compute` and persist its result.
///
/// A read error fails the lookup without computing. `compute` errors are
/// returned untouched and nothing is stored.
pub async fn get_or_compute<S, F, Fut, E>(
    store: &S,
    key: &str,
    policy: PersistPolicy,
    compute: F,
) -> Result<Lookup, GetOrComputeError<E>>
where
    S: BlobStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    if let Some(value) = store.get(key).await.map_err(GetOrComputeError::Store)? {
        return Ok(Lookup {
            value,
            origin: Origin::Stored,
        });
    }

    let value = compute().await.map_err(GetOrComputeError::Compute)?;

    if let Err(err) = store.put(key, &value).await {
        match policy {
            PersistPolicy::Strict => {
                error!(key, error = %err, "failed to persist cache entry");
                return Err(GetOrComputeError::Store(err));
            }
            PersistPolicy::BestEffort => {
                warn!(key, error = %err, "failed to persist cache entry, continuing");
            }
        }
    }

    Ok(Lookup {
        value,
        origin: Origin::Computed,
    })
}

/// Summary of placeholder cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from the settled in-memory map.
    pub memory_hits: u32,
    /// Attached to a computation already in flight.
    pub joined: u32,
    /// Computations answered by the disk store.
    pub disk_hits: u32,
    /// Computations that went to the network.
    pub fetched: u32,
    /// Computations that failed.
    pub failures: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.memory_hits + self.joined + self.disk_hits + self.fetched
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.memory_hits > 0 || self.joined > 0 || self.disk_hits > 0 {
            write!(
                f,
                "{} in memory, {} joined, {} from disk, {} fetched ({} total)",
                self.memory_hits,
                self.joined,
                self.disk_hits,
                self.fetched,
                self.total()
            )?;
        } else {
            write!(f, "{} fetched", self.fetched)?;
        }
        if self.failures > 0 {
            write!(f, ", {} failed", self.failures)?;
        }
        Ok(())
    }
}

//! Low-resolution placeholder acquisition with single-flight fan-out.
//!
//! A placeholder is a tiny rendition of the image (20px wide by default)
//! inlined as a `data:image/jpeg;base64,…` URI. Fetching one costs a network
//! round trip, and the same image is typically referenced by many documents
//! resolved concurrently. [`PlaceholderCache`] guarantees:
//!
//! - **At most one attempt per URL at a time.** The first caller starts the
//!   computation; every caller arriving while it runs receives a clone of the
//!   same [`PlaceholderHandle`] and observes the same outcome.
//! - **Settled values are served from memory** for the lifetime of the cache.
//! - **Durability across runs.** Payloads go through a [`BlobStore`] keyed by
//!   [`hash_url`], so a fresh process reading the same directory never hits
//!   the network for a payload it already has.
//! - **Failures are not cached.** A failed attempt is delivered to everyone
//!   who joined it, then forgotten; the next call tries again.
//!
//! ## Execution
//!
//! Every attempt is a shared future driven by whoever polls it. Inside a
//! Tokio runtime one clone is also spawned, so the attempt finishes and
//! populates the caches even if every caller drops its handle. Spawning
//! happens only after the attempt is registered and the state lock is
//! released. Outside a runtime an attempt whose handles were all dropped
//! stays registered and is driven by the next caller that joins it. The
//! store must then be usable without a runtime ([`DiskStore`] is not).

use crate::cache::{
    BlobStore, CacheStats, DiskStore, GetOrComputeError, Lookup, Origin, PersistPolicy,
    StoreError, get_or_compute, hash_url,
};
use crate::config::Settings;
use crate::fetch::{FetchError, Fetcher, HttpFetcher};
use crate::types::ImageSource;
use base64::{Engine as _, engine::general_purpose};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, debug_span};
use url::Url;

/// Media type prefix of every stored payload.
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Cloneable so one failure can be handed to every joined caller.
#[derive(Error, Debug, Clone)]
pub enum PlaceholderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to cache placeholder for {url}: {source}")]
    Store {
        url: String,
        #[source]
        source: Arc<StoreError>,
    },
    #[error("placeholder task for {url} did not complete: {message}")]
    Task { url: String, message: String },
}

type PlaceholderResult = Result<String, PlaceholderError>;

/// Deferred placeholder payload.
///
/// Always a future, even when the value is already known; await it to get
/// the data URI. Clones share one underlying attempt.
#[derive(Clone)]
pub struct PlaceholderHandle {
    inner: Shared<BoxFuture<'static, PlaceholderResult>>,
}

impl PlaceholderHandle {
    /// A handle that resolves immediately to `value`.
    pub fn ready(value: String) -> Self {
        let handle = Self::from_future(futures::future::ready(Ok(value)));
        // `Shared` only records its output once polled
        let _ = handle.inner.clone().now_or_never();
        handle
    }

    fn from_future(future: impl Future<Output = PlaceholderResult> + Send + 'static) -> Self {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// The outcome, if the attempt has already finished.
    pub fn peek(&self) -> Option<&PlaceholderResult> {
        self.inner.peek()
    }
}

impl Future for PlaceholderHandle {
    type Output = PlaceholderResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PlaceholderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderHandle")
            .field("settled", &self.peek().is_some())
            .finish()
    }
}

/// Tunables for a [`PlaceholderCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderOptions {
    /// Only base URLs on this host are fetched.
    pub api_host: String,
    /// Width of the low-resolution rendition.
    pub width: u32,
    pub persist: PersistPolicy,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            api_host: "images.ctfassets.net".to_string(),
            width: 20,
            persist: PersistPolicy::Strict,
        }
    }
}

impl From<&Settings> for PlaceholderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            api_host: settings.api.host.clone(),
            width: settings.placeholder.width,
            persist: settings.cache.persist,
        }
    }
}

#[derive(Default)]
struct State {
    in_flight: HashMap<String, PlaceholderHandle>,
    settled: HashMap<String, String>,
    stats: CacheStats,
}

struct Inner {
    state: Mutex<State>,
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn Fetcher>,
    options: PlaceholderOptions,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn compute(&self, url: &str) -> Result<Lookup, PlaceholderError> {
        let key = hash_url(url);
        get_or_compute(self.store.as_ref(), &key, self.options.persist, || async move {
            debug!("fetching placeholder");
            let bytes = self.fetcher.fetch(url).await?;
            Ok::<_, FetchError>(encode_data_uri(&bytes))
        })
        .await
        .map_err(|err| match err {
            GetOrComputeError::Store(source) => PlaceholderError::Store {
                url: url.to_string(),
                source: Arc::new(source),
            },
            GetOrComputeError::Compute(err) => PlaceholderError::Fetch(err),
        })
    }

    /// Clear the in-flight entry and, on success, settle the value.
    ///
    /// Both maps change under one lock so no caller sees the key in neither.
    fn finish(&self, url: &str, outcome: &Result<Lookup, PlaceholderError>) {
        // The removed handle is dropped after the lock is released.
        let finished = {
            let mut state = self.lock();
            match outcome {
                Ok(lookup) => {
                    match lookup.origin {
                        Origin::Stored => state.stats.disk_hits += 1,
                        Origin::Computed => state.stats.fetched += 1,
                    }
                    state.settled.insert(url.to_string(), lookup.value.clone());
                }
                Err(_) => state.stats.failures += 1,
            }
            state.in_flight.remove(url)
        };
        drop(finished);
    }
}

/// Clears the in-flight entry if the attempt ends without reaching
/// [`Inner::finish`] (dropped before completion, or a panic).
///
/// Never dropped while the state lock is held: attempts are only polled,
/// spawned or released after [`PlaceholderCache::get_placeholder`] has
/// unlocked.
struct InFlightGuard {
    inner: Arc<Inner>,
    url: Option<String>,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.url = None;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(url) = self.url.take() {
            let abandoned = self.inner.lock().in_flight.remove(&url);
            drop(abandoned);
        }
    }
}

/// Process-wide placeholder cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlaceholderCache {
    inner: Arc<Inner>,
}

impl PlaceholderCache {
    pub fn new(
        store: Arc<dyn BlobStore>,
        fetcher: Arc<dyn Fetcher>,
        options: PlaceholderOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                store,
                fetcher,
                options,
            }),
        }
    }

    /// Disk store under `cache.root`, HTTP fetcher with the configured timeout.
    pub fn from_config(settings: &Settings) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(Duration::from_secs(
            settings.placeholder.fetch_timeout_secs,
        ))?;
        Ok(Self::new(
            Arc::new(DiskStore::new(&settings.cache.root)),
            Arc::new(fetcher),
            PlaceholderOptions::from(settings),
        ))
    }

    pub fn options(&self) -> &PlaceholderOptions {
        &self.inner.options
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// The low-resolution fetch URL for `source`.
    ///
    /// `None` when the content type is not transformable or the base URL is
    /// not served by the configured image API host. Protocol-relative base
    /// URLs are fetched over HTTPS.
    pub fn placeholder_url(&self, source: &ImageSource) -> Option<String> {
        if !source.is_transformable() {
            return None;
        }

        let base = if source.base_url.starts_with("//") {
            format!("https:{}", source.base_url)
        } else {
            source.base_url.clone()
        };
        let parsed = Url::parse(&base).ok()?;
        if parsed.host_str() != Some(self.inner.options.api_host.as_str()) {
            return None;
        }

        Some(format!("{base}?w={}", self.inner.options.width))
    }

    /// Deferred placeholder payload for `source`, or `None` if ineligible.
    ///
    /// Settled keys resolve immediately, in-flight keys share the running
    /// attempt, and anything else starts exactly one new attempt.
    pub fn get_placeholder(&self, source: &ImageSource) -> Option<PlaceholderHandle> {
        let url = self.placeholder_url(source)?;

        let handle = {
            let mut state = self.inner.lock();

            if let Some(value) = state.settled.get(&url) {
                let handle = PlaceholderHandle::ready(value.clone());
                state.stats.memory_hits += 1;
                debug!(url = %url, "placeholder served from memory");
                return Some(handle);
            }
            if let Some(handle) = state.in_flight.get(&url) {
                let handle = handle.clone();
                state.stats.joined += 1;
                debug!(url = %url, "joined in-flight placeholder fetch");
                return Some(handle);
            }

            // Not polled yet, so it cannot finish before it is registered
            let handle = self.attempt(url.clone());
            state.in_flight.insert(url, handle.clone());
            handle
        };

        // A runtime that has shut down drops the task on the spot. That only
        // releases one clone; callers still drive the attempt themselves.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            drop(runtime.spawn(handle.clone()));
        }
        Some(handle)
    }

    /// The lazy attempt for `url`. A panic inside it is delivered to every
    /// caller as [`PlaceholderError::Task`].
    fn attempt(&self, url: String) -> PlaceholderHandle {
        let span = debug_span!("placeholder", url = %url);
        let inner = Arc::clone(&self.inner);
        let mut guard = InFlightGuard {
            inner: Arc::clone(&inner),
            url: Some(url.clone()),
        };
        let task_url = url.clone();

        let work = async move {
            let outcome = inner.compute(&url).await;
            inner.finish(&url, &outcome);
            guard.disarm();
            outcome.map(|lookup| lookup.value)
        }
        .instrument(span);

        PlaceholderHandle::from_future(AssertUnwindSafe(work).catch_unwind().map(
            move |result| {
                result.unwrap_or_else(|panic| {
                    Err(PlaceholderError::Task {
                        url: task_url,
                        message: panic_message(panic.as_ref()),
                    })
                })
            },
        ))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "attempt panicked".to_string()
    }
}

impl fmt::Debug for PlaceholderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderCache")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Wrap raw JPEG bytes as a data URI.
pub fn encode_data_uri(bytes: &[u8]) -> String {
    format!("{DATA_URI_PREFIX}{}", general_purpose::STANDARD.encode(bytes))
}

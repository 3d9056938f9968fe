//! End-to-end tests of the placeholder cache over a real disk store.
//!
//! The network is replaced by a counting fetcher so every test can assert
//! exactly how many fetches happened.
//!
//! Run with: cargo test --test placeholder_cache

use async_trait::async_trait;
use image_descriptors::cache::{DiskStore, PersistPolicy, hash_url};
use image_descriptors::config::load_config;
use image_descriptors::fetch::{FetchError, Fetcher};
use image_descriptors::placeholder::{PlaceholderCache, PlaceholderError, PlaceholderOptions};
use image_descriptors::types::ImageSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const BASE_URL: &str = "//images.ctfassets.net/space/asset/hash/photo.jpg";
const FETCH_URL: &str = "https://images.ctfassets.net/space/asset/hash/photo.jpg?w=20";
const PAYLOAD: &str = "data:image/jpeg;base64,aGVsbG8=";

struct CountingFetcher {
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl CountingFetcher {
    fn online() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        })
    }

    fn offline() -> Arc<Self> {
        let fetcher = Self::online();
        fetcher.offline.store(true, Ordering::SeqCst);
        fetcher
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Request {
                url: url.to_string(),
                message: "network unreachable".into(),
            });
        }
        Ok(b"hello".to_vec())
    }
}

fn photo() -> ImageSource {
    ImageSource::new(BASE_URL, "image/jpeg").with_dimensions(1200, 800)
}

fn disk_cache(root: &std::path::Path, fetcher: Arc<CountingFetcher>) -> PlaceholderCache {
    PlaceholderCache::new(
        Arc::new(DiskStore::new(root)),
        fetcher,
        PlaceholderOptions::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_fetch_once() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::online();
    let cache = disk_cache(tmp.path(), fetcher.clone());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_placeholder(&photo()).unwrap().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), PAYLOAD);
    }
    assert_eq!(fetcher.calls(), 1);

    let file = tmp
        .path()
        .join("images")
        .join(format!("{}.base64", hash_url(FETCH_URL)));
    assert_eq!(std::fs::read_to_string(file).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn restart_reads_from_disk_without_network() {
    let tmp = TempDir::new().unwrap();

    let first = CountingFetcher::online();
    let value = disk_cache(tmp.path(), first.clone())
        .get_placeholder(&photo())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(value, PAYLOAD);
    assert_eq!(first.calls(), 1);

    // A fresh instance stands in for a new process
    let second = CountingFetcher::offline();
    let cache = disk_cache(tmp.path(), second.clone());
    let value = cache.get_placeholder(&photo()).unwrap().await.unwrap();

    assert_eq!(value, PAYLOAD);
    assert_eq!(second.calls(), 0);
    assert_eq!(cache.stats().disk_hits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_restart_reads_disk_once() {
    let tmp = TempDir::new().unwrap();
    let store = DiskStore::new(tmp.path());
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.entry_path(&hash_url(FETCH_URL)), PAYLOAD).unwrap();

    let fetcher = CountingFetcher::offline();
    let cache = disk_cache(tmp.path(), fetcher.clone());
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_placeholder(&photo()).unwrap().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), PAYLOAD);
    }
    let stats = cache.stats();
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(stats.disk_hits, 1);
    assert_eq!(stats.joined + stats.memory_hits, 31);
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_call() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::offline();
    let cache = disk_cache(tmp.path(), fetcher.clone());

    let first = cache.get_placeholder(&photo()).unwrap().await;
    assert!(matches!(first, Err(PlaceholderError::Fetch(_))));
    assert!(!tmp.path().join("images").exists());

    fetcher.offline.store(false, Ordering::SeqCst);
    let second = cache.get_placeholder(&photo()).unwrap().await.unwrap();

    assert_eq!(second, PAYLOAD);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn failure_reaches_every_joined_caller() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::offline();
    let cache = disk_cache(tmp.path(), fetcher.clone());

    let a = cache.get_placeholder(&photo()).unwrap();
    let b = cache.get_placeholder(&photo()).unwrap();
    let (a, b) = tokio::join!(a, b);

    assert!(a.is_err());
    assert!(b.is_err());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn ineligible_sources_return_none() {
    let tmp = TempDir::new().unwrap();
    let fetcher = CountingFetcher::online();
    let cache = disk_cache(tmp.path(), fetcher.clone());

    let pdf = ImageSource::new("//images.ctfassets.net/space/asset/hash/doc.pdf", "application/pdf");
    assert!(cache.get_placeholder(&pdf).is_none());

    let elsewhere = ImageSource::new("//cdn.example.com/photo.jpg", "image/jpeg");
    assert!(cache.get_placeholder(&elsewhere).is_none());

    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn unwritable_cache_fails_under_strict_policy() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("not-a-dir");
    std::fs::write(&root, "").unwrap();

    let cache = disk_cache(&root, CountingFetcher::online());
    match cache.get_placeholder(&photo()).unwrap().await {
        Err(PlaceholderError::Store { url, source }) => {
            assert_eq!(url, FETCH_URL);
            assert!(source.to_string().contains("bytes"), "{source}");
        }
        other => panic!("expected store error, got {other:?}"),
    }
}

#[tokio::test]
async fn unwritable_cache_still_serves_under_best_effort_policy() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("not-a-dir");
    std::fs::write(&root, "").unwrap();

    let cache = PlaceholderCache::new(
        Arc::new(DiskStore::new(&root)),
        CountingFetcher::online(),
        PlaceholderOptions {
            persist: PersistPolicy::BestEffort,
            ..Default::default()
        },
    );

    let value = cache.get_placeholder(&photo()).unwrap().await.unwrap();
    assert_eq!(value, PAYLOAD);
}

#[tokio::test]
async fn options_follow_config_file() {
    let tmp = TempDir::new().unwrap();
    let cache_root = tmp.path().join("remote");
    std::fs::write(
        tmp.path().join("config.toml"),
        format!(
            "[cache]\nroot = {:?}\n\n[placeholder]\nwidth = 32\n",
            cache_root.display().to_string()
        ),
    )
    .unwrap();

    let settings = load_config(tmp.path()).unwrap();
    let fetcher = CountingFetcher::online();
    let cache = PlaceholderCache::new(
        Arc::new(DiskStore::new(&settings.cache.root)),
        fetcher,
        PlaceholderOptions::from(&settings),
    );

    assert_eq!(
        cache.placeholder_url(&photo()).as_deref(),
        Some("https://images.ctfassets.net/space/asset/hash/photo.jpg?w=32")
    );
    cache.get_placeholder(&photo()).unwrap().await.unwrap();
    assert!(cache_root.join("images").is_dir());
}

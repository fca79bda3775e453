mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::positions;
use nordshort::client::{FetchError, Freshness, TransportError, CACHE_FILE};
use nordshort::domain::Snapshot;
use nordshort::store::PublishedFile;
use nordshort::{CachedFetcher, FileTransport, SnapshotStore, Transport};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// File transport that counts rounds and can be switched off.
#[derive(Debug)]
struct CountingTransport {
    inner: FileTransport,
    rounds: AtomicUsize,
    down: AtomicBool,
}

impl CountingTransport {
    fn new(dir: &std::path::Path) -> Self {
        Self {
            inner: FileTransport::new(dir),
            rounds: AtomicUsize::new(0),
            down: AtomicBool::new(false),
        }
    }

    fn rounds(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }

    fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for CountingTransport {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    async fn fetch_file(&self, file: PublishedFile) -> Result<Option<Vec<u8>>, TransportError> {
        if file == PublishedFile::Current {
            self.rounds.fetch_add(1, Ordering::SeqCst);
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Http {
                url: "counting".to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.inner.fetch_file(file).await
    }
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
}

fn publish(dir: &TempDir, count: usize) -> Snapshot {
    let snapshot = Snapshot::new(t0(), "test", positions(count, t0()), BTreeMap::new());
    SnapshotStore::new(dir.path()).save(&snapshot).unwrap();
    snapshot
}

#[tokio::test]
async fn test_fresh_cache_skips_transport() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let fetcher = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(3600));

    let first = fetcher.fetch_at(false, t0()).await.unwrap();
    assert_eq!(first.freshness, Freshness::Refreshed);
    assert_eq!(transport.rounds(), 1);

    let second = fetcher
        .fetch_at(false, t0() + ChronoDuration::minutes(10))
        .await
        .unwrap();
    assert_eq!(second.freshness, Freshness::Cached);
    assert_eq!(transport.rounds(), 1);
    assert_eq!(second.snapshot, first.snapshot);
    assert_eq!(second.fetched_at, first.fetched_at);
    assert!(second.historical.is_some());
}

#[tokio::test]
async fn test_force_refresh_always_hits_transport() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let fetcher = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(3600));

    fetcher.fetch_at(false, t0()).await.unwrap();
    let forced = fetcher
        .fetch_at(true, t0() + ChronoDuration::minutes(1))
        .await
        .unwrap();
    assert_eq!(forced.freshness, Freshness::Refreshed);
    assert_eq!(transport.rounds(), 2);
}

#[tokio::test]
async fn test_stale_cache_served_when_transport_fails() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let snapshot = publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let fetcher = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(3600));
    fetcher.fetch_at(false, t0()).await.unwrap();

    transport.go_down();
    let later = t0() + ChronoDuration::hours(3);
    let data = fetcher.fetch_at(false, later).await.unwrap();
    assert!(data.is_stale());
    assert_eq!(data.snapshot, snapshot);
    assert_eq!(transport.rounds(), 2);

    let status = fetcher.status_at(later).await;
    assert!(status.has_cache);
    assert!(!status.cache_valid);
    assert_eq!(status.age_hours, Some(3.0));
}

#[tokio::test]
async fn test_invalid_publication_falls_back_to_cache() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let good = publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let fetcher = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(60));
    fetcher.fetch_at(false, t0()).await.unwrap();

    std::fs::write(
        published.path().join("short_positions_current.json"),
        br#"{"last_updated": "2026-03-10T06:00:00Z", "positions": []}"#,
    )
    .unwrap();
    let data = fetcher
        .fetch_at(false, t0() + ChronoDuration::minutes(5))
        .await
        .unwrap();
    assert!(data.is_stale());
    assert_eq!(data.snapshot, good);
}

#[tokio::test]
async fn test_no_cache_and_no_transport_is_no_data() {
    let empty = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let transport = Arc::new(CountingTransport::new(empty.path()));
    let fetcher = CachedFetcher::new(transport, cache.path(), Duration::from_secs(3600));

    match fetcher.fetch_at(false, t0()).await {
        Err(FetchError::NoData(reason)) => assert!(reason.contains("short_positions_current.json")),
        other => panic!("Expected NoData, got {:?}", other),
    }
    assert!(!fetcher.status_at(t0()).await.has_cache);
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let first = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(3600))
        .fetch_at(false, t0())
        .await
        .unwrap();
    assert!(cache.path().join(CACHE_FILE).exists());

    let restarted = CachedFetcher::new(transport.clone(), cache.path(), Duration::from_secs(3600));
    let data = restarted
        .fetch_at(false, t0() + ChronoDuration::minutes(30))
        .await
        .unwrap();
    assert_eq!(data.freshness, Freshness::Cached);
    assert_eq!(data.snapshot, first.snapshot);
    assert_eq!(transport.rounds(), 1);
}

#[tokio::test]
async fn test_concurrent_misses_share_one_refresh() {
    let published = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    publish(&published, 15);

    let transport = Arc::new(CountingTransport::new(published.path()));
    let fetcher = Arc::new(CachedFetcher::new(
        transport.clone(),
        cache.path(),
        Duration::from_secs(3600),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch_at(false, t0()).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(transport.rounds(), 1);
}

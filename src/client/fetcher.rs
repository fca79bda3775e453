//! TTL cache in front of a [`Transport`], with stale fallback.
//!
//! The cache entry lives in memory behind a `RwLock` and on disk as
//! `cache_entry.json`. Readers of a fresh entry only take the read lock.
//! Refreshes are serialized by a separate mutex so concurrent callers that
//! miss the cache trigger a single transport round.

use super::transport::{fetch_payload, Transport};
use crate::domain::Snapshot;
use crate::engine::trend::{compute_trend, DEFAULT_LOOKBACK_DAYS, LOOKBACK_BUFFER_DAYS};
use crate::engine::TrendReport;
use crate::orchestration::PublishMetadata;
use crate::store::{read_json, write_json_atomic, CompanyHistory, HistoryBook};
use crate::validation::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const CACHE_FILE: &str = "cache_entry.json";
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePayload {
    pub snapshot: Snapshot,
    pub metadata: Option<PublishMetadata>,
    pub historical: Option<HistoryBook>,
}

/// One successful transport round, as cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Local clock at the time of the fetch; the TTL runs from here.
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub source_transport: String,
    pub payload: CachePayload,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = self.age(now);
        age >= chrono::Duration::zero() && age.to_std().map(|a| a < ttl).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Served from an unexpired cache entry without touching the transport.
    Cached,
    /// Just fetched and validated.
    Refreshed,
    /// The refresh failed; this is the last good entry, possibly expired.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedData {
    pub snapshot: Snapshot,
    pub metadata: Option<PublishMetadata>,
    pub historical: Option<HistoryBook>,
    pub fetched_at: DateTime<Utc>,
    pub source_transport: String,
    pub freshness: Freshness,
}

impl FetchedData {
    fn from_entry(entry: &CacheEntry, freshness: Freshness) -> Self {
        Self {
            snapshot: entry.payload.snapshot.clone(),
            metadata: entry.payload.metadata.clone(),
            historical: entry.payload.historical.clone(),
            fetched_at: entry.fetched_at,
            source_transport: entry.source_transport.clone(),
            freshness,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// No cache exists and the transport could not supply valid data.
    #[error("No short position data available: {0}")]
    NoData(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub has_cache: bool,
    pub cache_valid: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
    pub ttl_secs: u64,
    pub transport: String,
}

#[derive(Debug)]
pub struct CachedFetcher {
    transport: Arc<dyn Transport>,
    cache_path: PathBuf,
    ttl: Duration,
    validator: Validator,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    refresh: Mutex<()>,
}

impl CachedFetcher {
    /// Create a fetcher, picking up any entry already cached in `cache_dir`.
    pub fn new(transport: Arc<dyn Transport>, cache_dir: impl AsRef<Path>, ttl: Duration) -> Self {
        let cache_path = cache_dir.as_ref().join(CACHE_FILE);
        let entry = match read_json::<CacheEntry>(&cache_path) {
            Ok(entry) => {
                debug!("Loaded cache entry from {}", cache_path.display());
                Some(Arc::new(entry))
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("Ignoring unreadable cache: {}", e);
                None
            }
        };
        Self {
            transport,
            cache_path,
            ttl,
            validator: Validator::default(),
            entry: RwLock::new(entry),
            refresh: Mutex::new(()),
        }
    }

    /// Validator used for the sanity check of fetched snapshots.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub async fn fetch(&self, force_refresh: bool) -> Result<FetchedData, FetchError> {
        self.fetch_at(force_refresh, Utc::now()).await
    }

    pub async fn fetch_at(
        &self,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<FetchedData, FetchError> {
        if !force_refresh {
            if let Some(data) = self.fresh_entry(now).await {
                return Ok(data);
            }
        }

        let _refreshing = self.refresh.lock().await;
        if !force_refresh {
            // Another caller may have refreshed while this one waited.
            if let Some(data) = self.fresh_entry(now).await {
                return Ok(data);
            }
        }

        match self.refresh_entry(now).await {
            Ok(entry) => {
                let data = FetchedData::from_entry(&entry, Freshness::Refreshed);
                *self.entry.write().await = Some(entry);
                Ok(data)
            }
            Err(reason) => {
                warn!("Refresh from {} failed: {}", self.transport.describe(), reason);
                match self.entry.read().await.as_ref() {
                    Some(entry) => {
                        info!("Serving cached data from {}", entry.fetched_at);
                        Ok(FetchedData::from_entry(entry, Freshness::Stale))
                    }
                    None => Err(FetchError::NoData(reason)),
                }
            }
        }
    }

    async fn fresh_entry(&self, now: DateTime<Utc>) -> Option<FetchedData> {
        let guard = self.entry.read().await;
        let entry = guard.as_ref()?;
        entry.is_fresh(now, self.ttl).then(|| {
            debug!("Cache hit, fetched at {}", entry.fetched_at);
            FetchedData::from_entry(entry, Freshness::Cached)
        })
    }

    /// One transport round plus sanity validation. Persists on success.
    async fn refresh_entry(&self, now: DateTime<Utc>) -> Result<Arc<CacheEntry>, String> {
        let payload = fetch_payload(self.transport.as_ref())
            .await
            .map_err(|e| e.to_string())?;

        let result = self.validator.validate_at(&payload.current, None, now);
        if !result.is_valid {
            result.log_details();
            return Err(format!(
                "fetched snapshot failed validation: {}",
                result.error_messages().join("; ")
            ));
        }
        let snapshot: Snapshot =
            serde_json::from_value(payload.current).map_err(|e| e.to_string())?;

        let entry = Arc::new(CacheEntry {
            fetched_at: now,
            ttl_secs: self.ttl.as_secs(),
            source_transport: self.transport.describe(),
            payload: CachePayload {
                snapshot,
                metadata: payload.metadata,
                historical: payload.historical,
            },
        });

        if let Err(e) = self.persist(&entry) {
            warn!("Cache not persisted: {}", e);
        }
        info!(
            "Refreshed {} positions from {}",
            entry.payload.snapshot.positions.len(),
            entry.source_transport
        );
        Ok(entry)
    }

    fn persist(&self, entry: &CacheEntry) -> Result<(), crate::store::StoreError> {
        if let Some(dir) = self.cache_path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| crate::store::StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        write_json_atomic(&self.cache_path, entry)
    }

    pub async fn status(&self) -> CacheStatus {
        self.status_at(Utc::now()).await
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> CacheStatus {
        let guard = self.entry.read().await;
        let entry = guard.as_ref();
        CacheStatus {
            has_cache: entry.is_some(),
            cache_valid: entry.map(|e| e.is_fresh(now, self.ttl)).unwrap_or(false),
            fetched_at: entry.map(|e| e.fetched_at),
            age_hours: entry.map(|e| e.age(now).num_seconds() as f64 / 3600.0),
            ttl_secs: self.ttl.as_secs(),
            transport: self.transport.describe(),
        }
    }

    /// Trailing `days` of one company's history from the fetched data.
    pub async fn history_window(
        &self,
        company: &str,
        days: i64,
    ) -> Result<Option<CompanyHistory>, FetchError> {
        let data = self.fetch(false).await?;
        let today = Utc::now().date_naive();
        Ok(data
            .historical
            .and_then(|book| book.window(company, days, today)))
    }

    /// Seven-day short interest trend for one company.
    pub async fn trend(&self, company: &str) -> Result<TrendReport, FetchError> {
        let today = Utc::now().date_naive();
        let window = self
            .history_window(company, DEFAULT_LOOKBACK_DAYS + LOOKBACK_BUFFER_DAYS)
            .await?;
        Ok(window
            .map(|history| compute_trend(&history, today, DEFAULT_LOOKBACK_DAYS))
            .unwrap_or_else(TrendReport::no_data))
    }
}

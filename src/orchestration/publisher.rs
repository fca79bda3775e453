//! One scheduled publisher run: fetch, match, validate, then store or reject.

use crate::datasource::{DataSourceError, RowRejection, SourceFetcher};
use crate::domain::{Market, ShortPosition, Snapshot};
use crate::engine::match_positions;
use crate::portfolio::PortfolioProvider;
use crate::store::{SnapshotStore, StoreError};
use crate::validation::{ValidationResult, ValidationStats, Validator};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_UPDATE_SOURCE: &str = "publisher";

/// Steps of a run, in order. A run ends in `Accepted` or `Rejected`
/// unless every source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPhase {
    Fetching,
    Matching,
    Validating,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Success,
    ValidationFailed,
    Error,
}

/// What one source contributed to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    pub market: Market,
    pub positions: usize,
    pub skipped_rows: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<RowRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub passed: bool,
    pub warnings_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub stats: ValidationStats,
}

impl From<&ValidationResult> for ValidationSummary {
    fn from(result: &ValidationResult) -> Self {
        Self {
            passed: result.is_valid,
            warnings_count: result.warnings.len(),
            warnings: result.warning_messages(),
            errors: result.error_messages(),
            stats: result.stats.clone(),
        }
    }
}

/// Contents of `short_positions_meta.json`, written after every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMetadata {
    pub last_update: DateTime<Utc>,
    pub status: PublishStatus,
    pub run_id: Uuid,
    pub total_positions: usize,
    pub positions_with_holders: usize,
    pub markets: Vec<Market>,
    pub per_market: BTreeMap<Market, usize>,
    pub portfolio_matches: usize,
    pub sources: Vec<SourceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub run_id: Uuid,
    pub status: PublishStatus,
    pub snapshot: Snapshot,
    pub validation: Option<ValidationResult>,
    pub metadata: PublishMetadata,
}

impl PublishOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == PublishStatus::Success
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct Publisher {
    sources: Vec<Arc<dyn SourceFetcher>>,
    portfolio: Arc<dyn PortfolioProvider>,
    validator: Validator,
    store: Arc<SnapshotStore>,
    source_timeout: Duration,
    update_source: String,
}

impl Publisher {
    pub fn new(
        sources: Vec<Arc<dyn SourceFetcher>>,
        portfolio: Arc<dyn PortfolioProvider>,
        validator: Validator,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            sources,
            portfolio,
            validator,
            store,
            source_timeout: Duration::from_secs(30),
            update_source: DEFAULT_UPDATE_SOURCE.to_string(),
        }
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn with_update_source(mut self, update_source: impl Into<String>) -> Self {
        self.update_source = update_source.into();
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub async fn run(&self) -> Result<PublishOutcome, PublishError> {
        self.run_at(Utc::now()).await
    }

    /// Run as of `now`; the snapshot is stamped with `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<PublishOutcome, PublishError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("publish", run_id = %run_id);
        self.run_inner(run_id, now).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, PublishError> {
        enter(PublishPhase::Fetching);
        let (positions, reports) = self.fetch_all().await;

        if reports.iter().all(|r| r.error.is_some()) {
            let message = if reports.is_empty() {
                "No sources configured".to_string()
            } else {
                let failures: Vec<String> = reports
                    .iter()
                    .map(|r| {
                        format!("{}: {}", r.name, r.error.as_deref().unwrap_or_default())
                    })
                    .collect();
                format!("All sources failed: {}", failures.join("; "))
            };
            error!("{}", message);
            let snapshot = Snapshot::new(now, &self.update_source, positions, BTreeMap::new());
            let metadata = metadata(
                run_id,
                &snapshot,
                PublishStatus::Error,
                reports,
                None,
                Some(message),
            );
            self.store.write_meta(&metadata)?;
            return Ok(PublishOutcome {
                run_id,
                status: PublishStatus::Error,
                snapshot,
                validation: None,
                metadata,
            });
        }

        enter(PublishPhase::Matching);
        let portfolio = match self.portfolio.tickers().await {
            Ok(tickers) => tickers,
            Err(e) => {
                warn!("Portfolio unavailable, matching against nothing: {}", e);
                Vec::new()
            }
        };
        let matches = match_positions(&positions, &portfolio);
        let snapshot = Snapshot::new(now, &self.update_source, positions, matches);

        enter(PublishPhase::Validating);
        let baseline = match self.store.load_baseline() {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!("Baseline unreadable, validating without it: {}", e);
                None
            }
        };
        let comparable = baseline.filter(|b| {
            let unchanged = b.fingerprint() == snapshot.fingerprint();
            if unchanged {
                info!("Positions unchanged since the last accepted snapshot");
            }
            !unchanged
        });
        let result = self
            .validator
            .validate_snapshot_at(&snapshot, comparable.as_ref(), now);
        result.log_details();

        let summary = Some(ValidationSummary::from(&result));
        let (status, error_message) = if result.is_valid {
            enter(PublishPhase::Accepted);
            match self.store.save(&snapshot) {
                Ok(()) => (PublishStatus::Success, None),
                Err(e) => {
                    error!("Accepted snapshot could not be stored: {}", e);
                    (
                        PublishStatus::Error,
                        Some(format!("Failed to store accepted snapshot: {}", e)),
                    )
                }
            }
        } else {
            enter(PublishPhase::Rejected);
            warn!("Keeping the previously accepted snapshot");
            (
                PublishStatus::ValidationFailed,
                Some(format!(
                    "Validation failed: {}",
                    result.error_messages().join("; ")
                )),
            )
        };

        let metadata = metadata(run_id, &snapshot, status, reports, summary, error_message);
        self.store.write_meta(&metadata)?;

        Ok(PublishOutcome {
            run_id,
            status,
            snapshot,
            validation: Some(result),
            metadata,
        })
    }

    /// Run every source concurrently. Failed sources contribute nothing.
    async fn fetch_all(&self) -> (Vec<ShortPosition>, Vec<SourceReport>) {
        let timeout = self.source_timeout;
        let results = join_all(self.sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(timeout, source.fetch_positions()).await {
                Ok(result) => result,
                Err(_) => Err(DataSourceError::Timeout(timeout)),
            };
            (source, result)
        }))
        .await;

        let mut positions = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for (source, result) in results {
            match result {
                Ok(batch) => {
                    info!(
                        "{} ({}): {} positions, {} rows skipped",
                        source.name(),
                        source.market(),
                        batch.positions.len(),
                        batch.skipped.len()
                    );
                    reports.push(SourceReport {
                        name: source.name().to_string(),
                        market: source.market(),
                        positions: batch.positions.len(),
                        skipped_rows: batch.skipped.len(),
                        rejections: batch.skipped,
                        error: None,
                    });
                    positions.extend(batch.positions);
                }
                Err(e) => {
                    warn!("{} ({}) unavailable: {}", source.name(), source.market(), e);
                    reports.push(SourceReport {
                        name: source.name().to_string(),
                        market: source.market(),
                        positions: 0,
                        skipped_rows: 0,
                        rejections: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        (positions, reports)
    }
}

fn enter(phase: PublishPhase) {
    info!(?phase, "publisher phase");
}

fn metadata(
    run_id: Uuid,
    snapshot: &Snapshot,
    status: PublishStatus,
    sources: Vec<SourceReport>,
    validation: Option<ValidationSummary>,
    error_message: Option<String>,
) -> PublishMetadata {
    let per_market = snapshot.per_market();
    PublishMetadata {
        last_update: snapshot.generated_at,
        status,
        run_id,
        total_positions: snapshot.positions.len(),
        positions_with_holders: snapshot.positions_with_holders(),
        markets: per_market.keys().copied().collect(),
        per_market,
        portfolio_matches: snapshot.matches.len(),
        sources,
        validation,
        error_message,
    }
}

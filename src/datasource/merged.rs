//! Aggregated totals enriched with holder breakdowns from a detailed feed.

use super::rows::holder_summary;
use super::{DataSourceError, SourceBatch, SourceFetcher};
use crate::domain::Market;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Combines an aggregated feed (complete totals, low threshold) with a
/// detailed feed (per-holder rows, higher threshold) for one market.
///
/// Totals always come from the aggregated feed. When it fails the detailed
/// feed is used alone; the source fails only when both do.
#[derive(Debug, Clone)]
pub struct MergedSource {
    name: String,
    aggregated: Arc<dyn SourceFetcher>,
    detailed: Arc<dyn SourceFetcher>,
}

impl MergedSource {
    pub fn new(
        name: impl Into<String>,
        aggregated: Arc<dyn SourceFetcher>,
        detailed: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            aggregated,
            detailed,
        }
    }
}

/// Attach holders from `detailed` to `aggregated` by exact company name.
pub fn merge_batches(aggregated: SourceBatch, detailed: SourceBatch) -> SourceBatch {
    let mut by_company: HashMap<String, _> = detailed
        .positions
        .into_iter()
        .map(|p| (p.company_name.clone(), p.individual_holders))
        .collect();

    let mut merged = aggregated;
    for pos in &mut merged.positions {
        if let Some(holders) = by_company.remove(&pos.company_name) {
            if !holders.is_empty() {
                pos.holder = holder_summary(&holders);
            }
            pos.individual_holders = holders;
        }
    }
    merged.skipped.extend(detailed.skipped);

    let with_holders = merged.positions.iter().filter(|p| p.has_holders()).count();
    info!(
        "Merged {} companies, {} with holder details",
        merged.positions.len(),
        with_holders
    );
    merged
}

#[async_trait]
impl SourceFetcher for MergedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn market(&self) -> Market {
        self.aggregated.market()
    }

    async fn fetch_positions(&self) -> Result<SourceBatch, DataSourceError> {
        let (aggregated, detailed) = tokio::join!(
            self.aggregated.fetch_positions(),
            self.detailed.fetch_positions()
        );

        match (aggregated, detailed) {
            (Ok(agg), Ok(det)) => Ok(merge_batches(agg, det)),
            (Ok(agg), Err(e)) => {
                warn!("{}: detailed feed failed, totals only: {}", self.name, e);
                Ok(agg)
            }
            (Err(e), Ok(det)) => {
                warn!("{}: aggregated feed failed, using detailed feed only: {}", self.name, e);
                Ok(det)
            }
            (Err(agg_err), Err(det_err)) => Err(DataSourceError::Other(format!(
                "both feeds failed: aggregated: {}; detailed: {}",
                agg_err, det_err
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockSource;
    use crate::domain::{PositionHolder, ShortPosition};
    use std::time::Duration;

    fn position(company: &str, pct: f64, holders: &[(&str, f64)]) -> ShortPosition {
        ShortPosition {
            ticker_or_identifier: format!("{}-ID", company),
            company_name: company.to_string(),
            holder: "Multiple (aggregated)".to_string(),
            percentage: pct,
            disclosure_date: "2026-03-09".to_string(),
            market: Market::Se,
            threshold_crossed: Some("0.1%".to_string()),
            individual_holders: holders
                .iter()
                .map(|(name, p)| PositionHolder {
                    holder_name: name.to_string(),
                    percentage: *p,
                    date: "2026-03-09".to_string(),
                })
                .collect(),
        }
    }

    fn merged(aggregated: MockSource, detailed: MockSource) -> MergedSource {
        MergedSource::new("se", Arc::new(aggregated), Arc::new(detailed))
    }

    #[tokio::test]
    async fn test_totals_from_aggregated_holders_from_detailed() {
        let source = merged(
            MockSource::new("agg", Market::Se)
                .with_position(position("Sinch AB", 4.2, &[]))
                .with_position(position("Nokia Oyj", 1.0, &[])),
            MockSource::new("det", Market::Se)
                .with_position(position("Sinch AB", 3.5, &[("Fund A", 2.0), ("Fund B", 1.5)])),
        );
        let batch = source.fetch_positions().await.unwrap();
        assert_eq!(batch.positions.len(), 2);
        let sinch = &batch.positions[0];
        assert_eq!(sinch.percentage, 4.2);
        assert_eq!(sinch.individual_holders.len(), 2);
        assert_eq!(sinch.holder, "2 holders (largest: Fund A 2.00%)");
        assert!(!batch.positions[1].has_holders());
    }

    #[tokio::test]
    async fn test_falls_back_to_detailed() {
        let source = merged(
            MockSource::new("agg", Market::Se)
                .with_error(DataSourceError::Timeout(Duration::from_secs(30))),
            MockSource::new("det", Market::Se)
                .with_position(position("Sinch AB", 3.5, &[("Fund A", 3.5)])),
        );
        let batch = source.fetch_positions().await.unwrap();
        assert_eq!(batch.positions[0].percentage, 3.5);
    }

    #[tokio::test]
    async fn test_fails_when_both_fail() {
        let source = merged(
            MockSource::new("agg", Market::Se)
                .with_error(DataSourceError::Timeout(Duration::from_secs(30))),
            MockSource::new("det", Market::Se)
                .with_error(DataSourceError::Network("refused".into())),
        );
        let err = source.fetch_positions().await.unwrap_err();
        assert!(err.to_string().contains("both feeds failed"));
    }
}

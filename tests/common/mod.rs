#![allow(dead_code)]

use chrono::{DateTime, Utc};
use nordshort::datasource::SourceFetcher;
use nordshort::domain::{Market, PortfolioTicker, PositionHolder, ShortPosition};
use nordshort::{MockSource, Publisher, SnapshotStore, StaticPortfolio, Validator};
use std::sync::Arc;
use tempfile::TempDir;

pub fn position(company: &str, pct: f64, now: DateTime<Utc>) -> ShortPosition {
    ShortPosition {
        ticker_or_identifier: format!("{}-LEI", company.replace(' ', "")),
        company_name: company.to_string(),
        holder: "Multiple (aggregated)".to_string(),
        percentage: pct,
        disclosure_date: now.date_naive().format("%Y-%m-%d").to_string(),
        market: Market::Se,
        threshold_crossed: Some("0.1%".to_string()),
        individual_holders: vec![],
    }
}

pub fn with_holders(mut pos: ShortPosition, holders: &[(&str, f64)]) -> ShortPosition {
    pos.individual_holders = holders
        .iter()
        .map(|(name, pct)| PositionHolder {
            holder_name: name.to_string(),
            percentage: *pct,
            date: pos.disclosure_date.clone(),
        })
        .collect();
    pos
}

/// `count` companies with percentages cycling through 1.0 to 8.0.
pub fn positions(count: usize, now: DateTime<Utc>) -> Vec<ShortPosition> {
    (0..count)
        .map(|i| position(&format!("Company {}", i), 1.0 + (i % 8) as f64, now))
        .collect()
}

pub fn portfolio() -> StaticPortfolio {
    StaticPortfolio(vec![
        PortfolioTicker::new("Ericsson B", "ERIC-B.ST"),
        PortfolioTicker::new("Company 3", "CO3.ST"),
    ])
}

pub fn publisher(dir: &TempDir, source: MockSource) -> Publisher {
    let sources: Vec<Arc<dyn SourceFetcher>> = vec![Arc::new(source)];
    Publisher::new(
        sources,
        Arc::new(portfolio()),
        Validator::default(),
        Arc::new(SnapshotStore::new(dir.path())),
    )
}

//! Daily per-company short-interest history with rolling retention.

use crate::domain::{Market, ShortPosition};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Days of history kept per company.
pub const RETENTION_DAYS: i64 = 365;

/// One company's short interest on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub percentage: f64,
    #[serde(rename = "holders")]
    pub holder_count: usize,
    #[serde(rename = "top_holder")]
    pub top_holder_name: Option<String>,
    #[serde(rename = "top_holder_pct")]
    pub top_holder_percentage: Option<f64>,
}

impl HistoryEntry {
    pub fn from_position(pos: &ShortPosition) -> Self {
        let top = pos.top_holder();
        Self {
            percentage: pos.percentage,
            holder_count: pos.individual_holders.len(),
            top_holder_name: top.map(|h| h.holder_name.clone()),
            top_holder_percentage: top.map(|h| h.percentage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyHistory {
    pub ticker: String,
    pub market: Market,
    pub history: BTreeMap<NaiveDate, HistoryEntry>,
}

impl CompanyHistory {
    pub fn latest(&self) -> Option<(&NaiveDate, &HistoryEntry)> {
        self.history.iter().next_back()
    }
}

/// History of every company, keyed by company name as disclosed.
///
/// Serialized as `short_positions_historical.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryBook {
    companies: BTreeMap<String, CompanyHistory>,
}

impl HistoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the entry for `date` for every position, then prune.
    ///
    /// Recording the same day twice overwrites that day's entry.
    pub fn record(&mut self, date: NaiveDate, positions: &[ShortPosition]) {
        for pos in positions {
            let company = self
                .companies
                .entry(pos.company_name.clone())
                .or_insert_with(|| CompanyHistory {
                    ticker: pos.ticker_or_identifier.clone(),
                    market: pos.market,
                    history: BTreeMap::new(),
                });
            company.ticker = pos.ticker_or_identifier.clone();
            company.market = pos.market;
            company.history.insert(date, HistoryEntry::from_position(pos));
        }
        self.prune(date);
    }

    /// Drop entries older than the retention window ending at `reference`,
    /// and companies left without entries.
    pub fn prune(&mut self, reference: NaiveDate) {
        let cutoff = reference - Duration::days(RETENTION_DAYS);
        for company in self.companies.values_mut() {
            company.history.retain(|day, _| *day > cutoff);
        }
        self.companies.retain(|_, c| !c.history.is_empty());
    }

    pub fn company(&self, name: &str) -> Option<&CompanyHistory> {
        self.companies.get(name)
    }

    /// The trailing `days` of one company's history, ending at `today`.
    ///
    /// A window reaching past the representable calendar covers the whole history.
    pub fn window(&self, name: &str, days: i64, today: NaiveDate) -> Option<CompanyHistory> {
        let company = self.companies.get(name)?;
        let cutoff = Duration::try_days(days)
            .and_then(|span| today.checked_sub_signed(span))
            .unwrap_or(NaiveDate::MIN);
        Some(CompanyHistory {
            ticker: company.ticker.clone(),
            market: company.market,
            history: company
                .history
                .iter()
                .filter(|(day, _)| **day >= cutoff)
                .map(|(day, entry)| (*day, entry.clone()))
                .collect(),
        })
    }

    pub fn company_names(&self) -> impl Iterator<Item = &str> {
        self.companies.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.companies.values().map(|c| c.history.len()).sum()
    }
}

//! Raw regulator rows and their conversion to canonical positions.

use super::{RowRejection, SourceBatch};
use crate::domain::{parse_disclosure_date, Market, PositionHolder, ShortPosition};
use std::collections::HashMap;

pub const AGGREGATED_HOLDER: &str = "Multiple (aggregated)";

/// One row as published by a regulator, fields still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRow {
    /// Total short interest for a company.
    Aggregated {
        company: String,
        identifier: String,
        percentage: String,
        date: String,
    },
    /// One holder's position in a company.
    Holder {
        holder: String,
        company: String,
        identifier: String,
        percentage: String,
        date: String,
    },
}

/// Parse a regulator percentage such as `"2,56"` or `"0.71 %"`.
pub fn parse_percentage(raw: &str) -> Result<f64, String> {
    let cleaned = raw.trim().trim_end_matches('%').trim().replace(',', ".");
    if cleaned.is_empty() {
        return Err("empty percentage".to_string());
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("unparsable percentage '{}'", raw.trim()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("non-positive percentage {}", value));
    }
    Ok(value)
}

/// `YYYY-MM-DD` when the date is in a known format, else the trimmed input.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    parse_disclosure_date(trimmed)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!name.is_empty() && !name.eq_ignore_ascii_case("nan")).then_some(name)
}

struct HolderGroup {
    company: String,
    identifier: String,
    holders: Vec<PositionHolder>,
}

/// Convert numbered rows to positions, one per company.
///
/// Holder rows are grouped per (company, identifier) and summed. Rows that
/// cannot be used are reported in [`SourceBatch::skipped`].
pub fn normalize_rows(
    rows: impl IntoIterator<Item = (usize, RawRow)>,
    market: Market,
    threshold: Option<&str>,
) -> SourceBatch {
    let mut batch = SourceBatch::default();
    let mut groups: Vec<HolderGroup> = Vec::new();
    let mut group_index: HashMap<(String, String), usize> = HashMap::new();

    for (row, raw) in rows {
        match raw {
            RawRow::Aggregated {
                company,
                identifier,
                percentage,
                date,
            } => {
                let Some(company) = clean_name(&company) else {
                    batch.skipped.push(RowRejection::new(row, "empty company name"));
                    continue;
                };
                let percentage = match parse_percentage(&percentage) {
                    Ok(p) => p,
                    Err(reason) => {
                        batch.skipped.push(RowRejection::new(row, reason));
                        continue;
                    }
                };
                batch.positions.push(ShortPosition {
                    ticker_or_identifier: identifier.trim().to_string(),
                    company_name: company,
                    holder: AGGREGATED_HOLDER.to_string(),
                    percentage,
                    disclosure_date: normalize_date(&date),
                    market,
                    threshold_crossed: threshold.map(str::to_string),
                    individual_holders: vec![],
                });
            }
            RawRow::Holder {
                holder,
                company,
                identifier,
                percentage,
                date,
            } => {
                let Some(company) = clean_name(&company) else {
                    batch.skipped.push(RowRejection::new(row, "empty company name"));
                    continue;
                };
                let Some(holder) = clean_name(&holder) else {
                    batch.skipped.push(RowRejection::new(row, "empty holder name"));
                    continue;
                };
                let percentage = match parse_percentage(&percentage) {
                    Ok(p) => p,
                    Err(reason) => {
                        batch.skipped.push(RowRejection::new(row, reason));
                        continue;
                    }
                };
                let identifier = identifier.trim().to_string();
                let key = (company.clone(), identifier.clone());
                let idx = *group_index.entry(key).or_insert_with(|| {
                    groups.push(HolderGroup {
                        company,
                        identifier,
                        holders: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[idx].holders.push(PositionHolder {
                    holder_name: holder,
                    percentage,
                    date: normalize_date(&date),
                });
            }
        }
    }

    for group in groups {
        batch
            .positions
            .push(group_to_position(group, market, threshold));
    }

    batch
}

fn group_to_position(group: HolderGroup, market: Market, threshold: Option<&str>) -> ShortPosition {
    let mut holders = group.holders;
    holders.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    let total: f64 = holders.iter().map(|h| h.percentage).sum();
    let latest_date = holders
        .iter()
        .max_by_key(|h| parse_disclosure_date(&h.date))
        .map(|h| h.date.clone())
        .unwrap_or_default();

    ShortPosition {
        ticker_or_identifier: group.identifier,
        company_name: group.company,
        holder: holder_summary(&holders),
        percentage: total,
        disclosure_date: latest_date,
        market,
        threshold_crossed: threshold.map(str::to_string),
        individual_holders: holders,
    }
}

/// `"N holders (largest: NAME P%)"`; holders must be sorted largest first.
pub fn holder_summary(holders: &[PositionHolder]) -> String {
    match holders.first() {
        Some(top) => format!(
            "{} holders (largest: {} {:.2}%)",
            holders.len(),
            top.holder_name,
            top.percentage
        ),
        None => AGGREGATED_HOLDER.to_string(),
    }
}

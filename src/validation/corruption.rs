//! Deltas against the last accepted snapshot.

use super::{IssueKind, ValidationIssue};
use crate::domain::{ShortPosition, Snapshot};
use crate::engine::normalize;
use std::collections::HashMap;

/// A count drop beyond this share is an error; beyond half of it, a warning.
pub const MAX_POSITION_LOSS_PERCENT: f64 = 50.0;
/// Per-company change in percentage points that counts as large.
pub const MAX_PERCENTAGE_CHANGE: f64 = 20.0;
/// Share of baseline companies with large changes that indicates systemic corruption.
pub const SYSTEMIC_CHANGE_FRACTION: f64 = 0.3;
/// Vanished companies below this are not worth reporting.
pub const DISAPPEARED_MIN_PERCENTAGE: f64 = 5.0;
pub const REPORTED_ITEMS_LIMIT: usize = 5;

#[derive(Debug, Default)]
pub struct CorruptionReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub position_count_change: Option<i64>,
    pub position_count_change_percent: Option<f64>,
    pub large_changes: usize,
    pub disappeared: usize,
}

struct LargeChange<'a> {
    company: &'a str,
    previous: f64,
    current: f64,
}

fn by_company(positions: &[ShortPosition]) -> HashMap<String, &ShortPosition> {
    positions
        .iter()
        .map(|p| (normalize(&p.company_name), p))
        .collect()
}

fn issue(message: String) -> ValidationIssue {
    ValidationIssue::new(IssueKind::Corruption, message)
}

pub fn check(current: &Snapshot, baseline: &Snapshot) -> CorruptionReport {
    let mut report = CorruptionReport::default();

    let prev_count = baseline.positions.len();
    let curr_count = current.positions.len();
    if prev_count > 0 {
        report.position_count_change = Some(curr_count as i64 - prev_count as i64);
        if curr_count < prev_count {
            let drop = (prev_count - curr_count) as f64 / prev_count as f64 * 100.0;
            report.position_count_change_percent = Some(-drop);
            if drop > MAX_POSITION_LOSS_PERCENT {
                report.errors.push(issue(format!(
                    "Suspicious drop in position count: {} -> {} ({:.1}% loss)",
                    prev_count, curr_count, drop
                )));
            } else if drop > MAX_POSITION_LOSS_PERCENT / 2.0 {
                report.warnings.push(issue(format!(
                    "Significant drop in position count: {} -> {} ({:.1}% loss)",
                    prev_count, curr_count, drop
                )));
            }
        } else {
            report.position_count_change_percent =
                Some((curr_count - prev_count) as f64 / prev_count as f64 * 100.0);
        }
    }

    let previous = by_company(&baseline.positions);
    let now = by_company(&current.positions);

    let mut large: Vec<LargeChange> = previous
        .iter()
        .filter_map(|(key, prev)| {
            let curr = now.get(key)?;
            ((curr.percentage - prev.percentage).abs() > MAX_PERCENTAGE_CHANGE).then(|| {
                LargeChange {
                    company: curr.company_name.as_str(),
                    previous: prev.percentage,
                    current: curr.percentage,
                }
            })
        })
        .collect();
    large.sort_by(|a, b| a.company.cmp(b.company));
    report.large_changes = large.len();

    if !large.is_empty() {
        if large.len() as f64 > previous.len() as f64 * SYSTEMIC_CHANGE_FRACTION {
            report.errors.push(issue(format!(
                "Too many positions with large percentage changes: {} positions changed by more than {}%",
                large.len(),
                MAX_PERCENTAGE_CHANGE
            )));
        } else {
            for change in large.iter().take(REPORTED_ITEMS_LIMIT) {
                report.warnings.push(issue(format!(
                    "Large change for {}: {:.2}% -> {:.2}% (Δ{:.2}%)",
                    change.company,
                    change.previous,
                    change.current,
                    (change.current - change.previous).abs()
                )));
            }
        }
    }

    let mut disappeared: Vec<&ShortPosition> = previous
        .iter()
        .filter(|(key, prev)| {
            !now.contains_key(*key) && prev.percentage >= DISAPPEARED_MIN_PERCENTAGE
        })
        .map(|(_, prev)| *prev)
        .collect();
    disappeared.sort_by(|a, b| a.company_name.cmp(&b.company_name));
    report.disappeared = disappeared.len();

    for pos in disappeared.iter().take(REPORTED_ITEMS_LIMIT) {
        report.warnings.push(issue(format!(
            "Position disappeared: {} (had {:.2}% short interest)",
            pos.company_name, pos.percentage
        )));
    }

    report
}

//! Freshness of the snapshot and sanity of each position.

use super::{IssueKind, ValidationIssue};
use crate::domain::ShortPosition;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Above this a percentage is implausible, though not impossible.
pub const MAX_REASONABLE_PERCENTAGE: f64 = 50.0;
/// Holder-level percentages may differ from the aggregate by this much.
pub const HOLDER_SUM_TOLERANCE: f64 = 1.0;
pub const MAX_POSITION_AGE_DAYS: i64 = 365;
pub const FUTURE_TIMESTAMP_TOLERANCE_HOURS: i64 = 1;
pub const FUTURE_DATE_TOLERANCE_DAYS: i64 = 1;

#[derive(Debug, Default)]
pub struct FreshnessReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub age_hours: f64,
}

pub fn check_freshness(
    generated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age_hours: u32,
) -> FreshnessReport {
    let mut report = FreshnessReport {
        age_hours: (now - generated_at).num_seconds() as f64 / 3600.0,
        ..Default::default()
    };
    let max = f64::from(max_age_hours);

    if report.age_hours > max {
        report.errors.push(ValidationIssue::new(
            IssueKind::Freshness,
            format!(
                "Data is too old: {:.1} hours (max allowed: {} hours)",
                report.age_hours, max_age_hours
            ),
        ));
    } else if report.age_hours > max / 2.0 {
        report.warnings.push(ValidationIssue::new(
            IssueKind::Freshness,
            format!("Data is getting stale: {:.1} hours old", report.age_hours),
        ));
    }

    if generated_at > now + Duration::hours(FUTURE_TIMESTAMP_TOLERANCE_HOURS) {
        report.errors.push(ValidationIssue::new(
            IssueKind::Freshness,
            format!(
                "Data timestamp is in the future: {}",
                generated_at.to_rfc3339()
            ),
        ));
    }

    report
}

#[derive(Debug, Default)]
pub struct ValueReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub positions_checked: usize,
    pub positions_with_issues: usize,
}

pub fn check_positions(
    positions: &[ShortPosition],
    today: NaiveDate,
    min_expected_positions: usize,
) -> ValueReport {
    let mut report = ValueReport::default();

    if positions.is_empty() {
        report.errors.push(ValidationIssue::new(
            IssueKind::Value,
            "No positions found - this indicates a data fetch failure. \
             Rejecting to prevent data corruption.",
        ));
    } else if positions.len() < min_expected_positions {
        report.warnings.push(ValidationIssue::new(
            IssueKind::Value,
            format!(
                "Only {} positions found (expected at least {})",
                positions.len(),
                min_expected_positions
            ),
        ));
    }

    for (i, pos) in positions.iter().enumerate() {
        report.positions_checked += 1;
        let errors_before = report.errors.len();
        let warnings_before = report.warnings.len();
        check_position(i, pos, today, &mut report);
        if report.errors.len() > errors_before || report.warnings.len() > warnings_before {
            report.positions_with_issues += 1;
        }
    }

    report
}

fn check_position(i: usize, pos: &ShortPosition, today: NaiveDate, report: &mut ValueReport) {
    let label = format!("Position {} ({})", i, pos.ticker_or_identifier);
    let pct = pos.percentage;

    if !pct.is_finite() {
        report.errors.push(ValidationIssue::new(
            IssueKind::Value,
            format!("{}: percentage is not a number: {}", label, pct),
        ));
    } else if pct < 0.0 {
        report.errors.push(ValidationIssue::new(
            IssueKind::Value,
            format!("{}: negative percentage: {}", label, pct),
        ));
    } else if pct > MAX_REASONABLE_PERCENTAGE {
        report.warnings.push(ValidationIssue::new(
            IssueKind::Value,
            format!("{}: unusually high percentage: {}%", label, pct),
        ));
    } else if pct == 0.0 {
        report.warnings.push(ValidationIssue::new(
            IssueKind::Value,
            format!("{}: zero percentage", label),
        ));
    }

    if !pos.disclosure_date.is_empty() {
        match pos.parsed_date() {
            Some(date) if date < today - Duration::days(MAX_POSITION_AGE_DAYS) => {
                report.warnings.push(ValidationIssue::new(
                    IssueKind::Value,
                    format!("{}: position date is very old: {}", label, pos.disclosure_date),
                ));
            }
            Some(date) if date > today + Duration::days(FUTURE_DATE_TOLERANCE_DAYS) => {
                report.errors.push(ValidationIssue::new(
                    IssueKind::Value,
                    format!(
                        "{}: position date is in the future: {}",
                        label, pos.disclosure_date
                    ),
                ));
            }
            Some(_) => {}
            None => report.warnings.push(ValidationIssue::new(
                IssueKind::Value,
                format!("{}: unparseable position date: {}", label, pos.disclosure_date),
            )),
        }
    }

    if pos.has_holders() {
        let holder_sum = pos.holder_sum();
        if (holder_sum - pct).abs() > HOLDER_SUM_TOLERANCE {
            report.warnings.push(ValidationIssue::new(
                IssueKind::Value,
                format!(
                    "{}: holder sum ({:.2}%) doesn't match total ({:.2}%)",
                    label, holder_sum, pct
                ),
            ));
        }
    }
}
